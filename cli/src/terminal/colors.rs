use colored::Color;

pub const PRIMARY: Color = Color::BrightBlue;
pub const ACCENT: Color = Color::BrightYellow;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;
pub const REACHABLE: Color = Color::BrightGreen;
pub const UNREACHABLE: Color = Color::BrightRed;
pub const CIDR: Color = Color::Cyan;
