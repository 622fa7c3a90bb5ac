//! Wikidata brand colors for terminal output.

pub const WD_RED: &str = "\x1b[38;2;153;0;0m";
pub const WD_GREEN: &str = "\x1b[38;2;51;153;102m";
pub const WD_BLUE: &str = "\x1b[38;2;0;102;153m";
pub const RESET: &str = "\x1b[0m";

/// The multicolored banner printed after a successful upload.
pub fn thank_you_message() -> String {
  let heart = '\u{2665}';
  format!(
    "Thank you for helping to improve Wikidata's data! {}{}{}{}{}{}{}{}{}",
    WD_RED, heart, WD_GREEN, heart, WD_BLUE, heart, WD_GREEN, heart, RESET
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn banner_resets_the_terminal() {
    let banner = thank_you_message();
    assert!(banner.starts_with("Thank you"));
    assert!(banner.ends_with(RESET));
  }
}
