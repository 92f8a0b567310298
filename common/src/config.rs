/// Terminal presentation settings shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Hides the start banner.
    pub no_banner: bool,
    /// 0 prints everything, 1 drops decoration, 2 prints summaries only.
    pub quiet: u8,
}
