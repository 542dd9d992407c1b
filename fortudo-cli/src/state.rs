use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$FORTUDO_HOME`, else `~/.fortudo`.
pub fn fortudo_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("FORTUDO_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".fortudo"))
}

pub fn ensure_fortudo_home() -> Result<PathBuf> {
    let dir = fortudo_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Room names become file names, so keep them to a safe alphabet.
pub fn validate_room(room: &str) -> Result<&str> {
    let ok = !room.is_empty()
        && room.len() <= 64
        && room
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        bail!("invalid room name {room:?}: use letters, digits, '-' or '_'");
    }
    Ok(room)
}

pub fn room_file_name(room: &str) -> Result<String> {
    Ok(format!("{}.json", validate_room(room)?))
}

pub fn room_path(room: &str) -> Result<PathBuf> {
    Ok(ensure_fortudo_home()?.join("rooms").join(room_file_name(room)?))
}
