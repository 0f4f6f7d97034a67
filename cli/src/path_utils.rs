use std::path::Path;
use std::path::PathBuf;

/// Resolve a leading `~` in `--state-dir` against the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    expand_tilde_with_home(path, dirs::home_dir().as_deref())
}

/// Shorten paths under the home directory to `~/...` for messages.
pub fn display_with_tilde(path: &Path) -> String {
    match dirs::home_dir() {
        Some(home) => display_relative_to_home(path, &home),
        None => path.display().to_string(),
    }
}

fn expand_tilde_with_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

fn display_relative_to_home(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}
