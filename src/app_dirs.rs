use directories::ProjectDirs;
use std::path::PathBuf;

/// Where recite keeps its files: the practice database under the XDG
/// state dir, configuration under the config dir.
pub struct AppDirs;

enum Area {
    State,
    Config,
}

impl AppDirs {
    pub fn db_path() -> Option<PathBuf> {
        Self::dir(Area::State).map(|d| d.join("passages.db"))
    }

    pub fn config_path() -> PathBuf {
        Self::dir(Area::Config)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.json")
    }

    // HOME gives the XDG layout directly; ProjectDirs covers platforms
    // without it.
    fn dir(area: Area) -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let home = PathBuf::from(home);
            return Some(match area {
                Area::State => home.join(".local").join("state").join("recite"),
                Area::Config => home.join(".config").join("recite"),
            });
        }
        let proj = ProjectDirs::from("", "", "recite")?;
        Some(match area {
            Area::State => proj.data_local_dir().to_path_buf(),
            Area::Config => proj.config_dir().to_path_buf(),
        })
    }
}
