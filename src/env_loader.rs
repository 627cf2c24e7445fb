use std::env;
use std::path::PathBuf;

fn fallback_dotenv_paths(sync_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(base) = sync_home {
        out.push(base.join(".env"));
    }
    if let Some(home) = home_dir {
        out.push(home.join(".wake-focus/.env"));
    }
    out
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let candidates = fallback_dotenv_paths(
        env::var_os("WAKE_FOCUS_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    for path in candidates {
        if path.is_file() {
            let _ = dotenvy::from_path(&path);
            return;
        }
    }
}
