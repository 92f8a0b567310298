use colored::*;

use crate::terminal::print;

const BANNER_0: &str = r#"
                         __
       ________  ____ _____/ /_  _____
      / ___/ _ \/ __ `/ ___/ __ \/ ___/
     / /  /  __/ /_/ / /__/ / / / /
    /_/   \___/\__,_/\___/_/ /_/_/
"#;

const BANNER_1: &str = r#"
     ____  _____    _    ____ _   _ ____
    |  _ \| ____|  / \  / ___| | | |  _ \
    | |_) |  _|   / _ \| |   | |_| | |_) |
    |  _ <| |___ / ___ \ |___|  _  |  _ <
    |_| \_\_____/_/   \_\____|_| |_|_| \_\
"#;

const BANNER_2: &str = r#"
      .---.  .---.  .--.   .---. .-. .-..---.
      : .; :: .--': .; : : .--': :_: :: .; :
      :   .': `;  :    : : :   :     ::   .'
      : :.`.: :__ : :: : : :__ : :.: :: :.`.
      :_;:_;`.__.':_;:_; `.__.':_;:_;:_;:_;
"#;

const BANNERS: [&str; 3] = [BANNER_0, BANNER_1, BANNER_2];

pub fn print() {
    let n: usize = rand::random_range(0..BANNERS.len());
    print::print(&format!("{}", BANNERS[n].bright_green()));
}
