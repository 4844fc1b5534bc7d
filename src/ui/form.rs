//! 表单输入校验：两套界面共用，把用户输入转换成 [`JobRequest`]。
//!
//! 校验失败时不派发任何任务。

use crate::base_system::context::Config;
use crate::download::errors::InputError;
use crate::download::models::{
    DownloadJob, JobRequest, MediaKind, Platform, PlaylistRequest, QUALITY_CHOICES,
};
use crate::download::platform::matches_platform;
use crate::download::range::parse_ranges;

#[derive(Debug, Clone)]
pub struct SingleForm {
    pub url: String,
    pub platform: Platform,
    pub kind: MediaKind,
}

impl SingleForm {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: String::new(),
            platform: config.preferred_platform(),
            kind: config.preferred_media_kind(),
        }
    }

    pub fn build(&self, config: &Config) -> Result<JobRequest, InputError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(InputError::MissingField("URL"));
        }
        if !matches_platform(url, self.platform) {
            return Err(InputError::WrongPlatform {
                platform: self.platform.title(),
            });
        }
        Ok(JobRequest::Single {
            platform: self.platform,
            job: DownloadJob {
                url: url.to_string(),
                dest_dir: config.single_dir(),
                kind: self.kind,
                max_height: self.platform.default_max_height(),
            },
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlaylistForm {
    pub url: String,
    pub folder: String,
    pub range: String,
    pub kind: MediaKind,
    pub quality: u32,
}

impl PlaylistForm {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: String::new(),
            folder: String::new(),
            range: String::new(),
            kind: MediaKind::Video,
            quality: config.playlist_quality,
        }
    }

    /// 切换到下一个画质选项，到末尾后回到开头。
    pub fn cycle_quality(&mut self) {
        let idx = QUALITY_CHOICES
            .iter()
            .position(|q| *q == self.quality)
            .unwrap_or(0);
        self.quality = QUALITY_CHOICES[(idx + 1) % QUALITY_CHOICES.len()];
    }

    pub fn build(&self, config: &Config) -> Result<JobRequest, InputError> {
        let url = self.url.trim();
        let folder = self.folder.trim();
        let range = self.range.trim();
        if url.is_empty() {
            return Err(InputError::MissingField("playlist URL"));
        }
        if folder.is_empty() {
            return Err(InputError::MissingField("folder name"));
        }
        if range.is_empty() {
            return Err(InputError::MissingField("video range"));
        }
        let indices = parse_ranges(range)?;
        if self.kind == MediaKind::Video && !QUALITY_CHOICES.contains(&self.quality) {
            return Err(InputError::Quality(self.quality));
        }
        Ok(JobRequest::Playlist(PlaylistRequest {
            url: url.to_string(),
            dest_dir: config.resolve_folder(folder),
            indices,
            kind: self.kind,
            max_height: self.quality,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::errors::RangeError;

    fn config() -> Config {
        Config {
            save_path: "/srv/media".into(),
            ..Config::default()
        }
    }

    #[test]
    fn single_rejects_wrong_platform() {
        let form = SingleForm {
            url: "https://www.tiktok.com/@x/video/123".into(),
            platform: Platform::Facebook,
            kind: MediaKind::Video,
        };
        assert_eq!(
            form.build(&config()).unwrap_err(),
            InputError::WrongPlatform {
                platform: "Facebook"
            }
        );
    }

    #[test]
    fn single_builds_job_with_platform_ceiling() {
        let form = SingleForm {
            url: "  https://vm.tiktok.com/ZM1/ ".into(),
            platform: Platform::TikTok,
            kind: MediaKind::Video,
        };
        match form.build(&config()).unwrap() {
            JobRequest::Single { platform, job } => {
                assert_eq!(platform, Platform::TikTok);
                assert_eq!(job.url, "https://vm.tiktok.com/ZM1/");
                assert_eq!(job.max_height, 1080);
                assert!(job.dest_dir.ends_with("downloaded_items"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn single_requires_url() {
        let form = SingleForm::from_config(&config());
        assert_eq!(
            form.build(&config()).unwrap_err(),
            InputError::MissingField("URL")
        );
    }

    #[test]
    fn playlist_validates_every_field() {
        let mut form = PlaylistForm::from_config(&config());
        form.url = "https://www.youtube.com/playlist?list=PL1".into();
        assert_eq!(
            form.build(&config()).unwrap_err(),
            InputError::MissingField("folder name")
        );

        form.folder = "Lectures".into();
        form.range = "5-3".into();
        assert_eq!(
            form.build(&config()).unwrap_err(),
            InputError::Range(RangeError::Descending { start: 5, end: 3 })
        );

        form.range = "1-50000000".into();
        assert!(matches!(
            form.build(&config()).unwrap_err(),
            InputError::Range(RangeError::TooLarge { .. })
        ));

        form.range = "1-3,5".into();
        match form.build(&config()).unwrap() {
            JobRequest::Playlist(req) => {
                assert_eq!(req.indices.as_slice(), &[0, 1, 2, 4]);
                assert_eq!(req.max_height, 720);
                assert!(req.dest_dir.ends_with("Lectures"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quality_cycles_through_choices() {
        let mut form = PlaylistForm::from_config(&config());
        let mut seen = vec![form.quality];
        for _ in 0..4 {
            form.cycle_quality();
            seen.push(form.quality);
        }
        assert_eq!(seen, vec![720, 480, 360, 1080, 720]);
    }
}
