use std::path::{Path, PathBuf};

/// Default root for all job directories.
pub fn root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("slidecast")
}

/// Working directory for a script, keyed by its hash.
pub fn job_dir(work_root: &Path, script_hash: &str) -> PathBuf {
    work_root.join(script_hash)
}

pub fn frames_dir(job_dir: &Path) -> PathBuf {
    job_dir.join("frames")
}

pub fn audio_dir(job_dir: &Path) -> PathBuf {
    job_dir.join("audio")
}

/// Content-addressed PNG for a frame fingerprint.
pub fn frame_path(job_dir: &Path, fingerprint: &str) -> PathBuf {
    frames_dir(job_dir).join(format!("{fingerprint}.png"))
}

/// HTML source the frame was rendered from, kept next to the PNG.
pub fn frame_html_path(job_dir: &Path, fingerprint: &str) -> PathBuf {
    frames_dir(job_dir).join(format!("{fingerprint}.html"))
}

pub fn audio_path(job_dir: &Path, audio_key: &str) -> PathBuf {
    audio_dir(job_dir).join(format!("{audio_key}.mp3"))
}

pub fn concat_manifest_path(job_dir: &Path) -> PathBuf {
    job_dir.join("concat.txt")
}

pub fn silent_video_path(job_dir: &Path) -> PathBuf {
    job_dir.join("silent.mp4")
}

/// Muxed output before the terminal move to the caller's path.
pub fn staged_output_path(job_dir: &Path) -> PathBuf {
    job_dir.join("output.mp4")
}

pub fn manifest_path(job_dir: &Path) -> PathBuf {
    job_dir.join("manifest.json")
}

pub fn crash_manifest_path(job_dir: &Path) -> PathBuf {
    job_dir.join("crash.json")
}

pub fn lock_path(job_dir: &Path) -> PathBuf {
    job_dir.join(".lock")
}
