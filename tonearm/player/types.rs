use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Locator for playable content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MediaSource {
    Path(PathBuf),
    Uri(String),
}

impl MediaSource {
    /// Anything with a scheme separator is taken as a URI, the rest as a local path.
    pub fn parse(locator: &str) -> Self {
        if locator.contains("://") {
            MediaSource::Uri(locator.to_string())
        } else {
            MediaSource::Path(PathBuf::from(locator))
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        MediaSource::Path(path.as_ref().to_path_buf())
    }

    /// Last path segment, used as the track label.
    pub fn file_name(&self) -> String {
        match self {
            MediaSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            MediaSource::Uri(uri) => {
                let without_query = uri.split(['?', '#']).next().unwrap_or(uri);
                without_query
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Path(path) => write!(f, "{}", path.display()),
            MediaSource::Uri(uri) => f.write_str(uri),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        };
        f.write_str(name)
    }
}

/// Output level in percent, always within `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: u8 = 100;

    /// Saturates at 100.
    pub fn new(level: u8) -> Self {
        Volume(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Linear mapping onto the backend's normalized gain.
    pub fn gain(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Volume(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_is_linear_over_the_whole_range() {
        assert!((Volume::new(0).gain() - 0.0).abs() < f64::EPSILON);
        assert!((Volume::new(100).gain() - 1.0).abs() < f64::EPSILON);
        for level in 0..=100u8 {
            let expected = f64::from(level) / 100.0;
            assert!((Volume::new(level).gain() - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn volume_saturates_above_max() {
        assert_eq!(Volume::new(250).level(), 100);
    }

    #[test]
    fn locators_with_a_scheme_are_uris() {
        assert_eq!(
            MediaSource::parse("https://example.com/a.mp3"),
            MediaSource::Uri("https://example.com/a.mp3".to_string())
        );
        assert_eq!(
            MediaSource::parse("music/a.flac"),
            MediaSource::Path(PathBuf::from("music/a.flac"))
        );
    }

    #[test]
    fn file_name_strips_directories_and_queries() {
        assert_eq!(MediaSource::parse("/home/u/song.wav").file_name(), "song.wav");
        assert_eq!(
            MediaSource::parse("http://host/dir/track.mp3?token=1").file_name(),
            "track.mp3"
        );
    }
}
