use indicatif::ProgressStyle;

pub struct ProgressBar(indicatif::ProgressBar);

impl twitter_likes::ProgressBar for ProgressBar {
    fn init(total: usize, description: &str) -> Self {
        let pb = indicatif::ProgressBar::new(total as u64);
        let sty = ProgressStyle::default_bar()
            .template("{msg} [{wide_bar}] {pos:>5}/{len:5} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(sty);
        pb.set_message(description.to_owned());
        Self(pb)
    }

    fn set_position(&self, position: usize) {
        self.0.set_position(position as u64);
    }

    fn increment(&self) {
        self.0.inc(1);
    }

    fn destroy(self) {
        self.0.finish_and_clear();
    }
}
