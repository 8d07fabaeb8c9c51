//! ffmpeg remux of raw H.264 segments into MP4
//!
//! The video stream is copied, not re-encoded, so conversion of a segment is
//! I/O bound and takes a fraction of the segment's duration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::{ConversionError, Converter};
use crate::store::CONTAINER_EXTENSION;

/// Suffix of a container still being written
///
/// The finished name is only taken by a rename after ffmpeg succeeds, so a
/// listed `.mp4` is always complete.
pub const PARTIAL_SUFFIX: &str = "part";

/// Longest stderr excerpt kept in a failure report
const STDERR_TAIL: usize = 2048;

/// Converter backed by the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    program: PathBuf,
    framerate: Option<u32>,
}

impl FfmpegConverter {
    /// Use `ffmpeg` from `PATH`
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific ffmpeg executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            framerate: None,
        }
    }

    /// Declare the input frame rate
    ///
    /// Raw H.264 carries no timestamps; without this ffmpeg assumes 25 fps.
    pub fn framerate(mut self, fps: u32) -> Self {
        self.framerate = Some(fps);
        self
    }

    /// The executable this converter runs
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Container path produced for a raw segment
    pub fn output_path(raw: &Path) -> PathBuf {
        raw.with_extension(CONTAINER_EXTENSION)
    }

    /// Path ffmpeg writes to before the container is renamed into place
    pub fn partial_path(raw: &Path) -> PathBuf {
        raw.with_extension(format!("{}.{}", CONTAINER_EXTENSION, PARTIAL_SUFFIX))
    }

    /// Argument vector for converting `raw` into `output`
    ///
    /// The muxer is named explicitly since `output` may carry the partial
    /// suffix.
    pub fn args(&self, raw: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

        if let Some(fps) = self.framerate {
            args.push("-framerate".into());
            args.push(fps.to_string().into());
        }

        args.push("-i".into());
        args.push(raw.into());
        args.extend(["-y", "-c:v", "copy", "-an", "-f", "mp4"].map(OsString::from));
        args.push(output.into());
        args
    }
}

impl Default for FfmpegConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for FfmpegConverter {
    async fn convert(&self, raw: &Path) -> Result<PathBuf, ConversionError> {
        let output = Self::output_path(raw);
        let partial = Self::partial_path(raw);

        tracing::debug!(
            input = %raw.display(),
            output = %output.display(),
            "Starting conversion"
        );

        let result = Command::new(&self.program)
            .args(self.args(raw, &partial))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ConversionError::Launch)?;

        if !result.status.success() {
            remove_partial(&partial).await;

            let stderr = String::from_utf8_lossy(&result.stderr);
            let start = stderr.len().saturating_sub(STDERR_TAIL);
            let tail = stderr.get(start..).unwrap_or(&stderr).trim();

            return Err(ConversionError::Failed {
                path: raw.to_path_buf(),
                reason: if tail.is_empty() {
                    result.status.to_string()
                } else {
                    format!("{}: {}", result.status, tail)
                },
            });
        }

        if !tokio::fs::try_exists(&partial).await? {
            return Err(ConversionError::MissingOutput(partial));
        }

        if let Err(e) = tokio::fs::rename(&partial, &output).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }

        Ok(output)
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(output = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let raw = Path::new("/srv/recordings/2024-05-01_13-45-09.h264");
        assert_eq!(
            FfmpegConverter::output_path(raw),
            PathBuf::from("/srv/recordings/2024-05-01_13-45-09.mp4")
        );
    }

    #[test]
    fn test_partial_path_not_listable() {
        let raw = Path::new("/srv/recordings/2024-05-01_13-45-09.h264");
        let partial = FfmpegConverter::partial_path(raw);

        assert_eq!(
            partial,
            PathBuf::from("/srv/recordings/2024-05-01_13-45-09.mp4.part")
        );
        let name = partial.file_name().unwrap().to_str().unwrap();
        assert!(crate::store::RecordingName::parse(name).is_none());
    }

    #[test]
    fn test_args_keep_paths_as_single_arguments() {
        let converter = FfmpegConverter::new();
        let raw = Path::new("dir with space/a; rm -rf x.h264");
        let out = Path::new("dir with space/a; rm -rf x.mp4");

        let args = converter.args(raw, out);
        let input_pos = args.iter().position(|a| a == "-i").unwrap();

        assert_eq!(args[input_pos + 1], OsString::from(raw));
        assert_eq!(args.last().unwrap(), &OsString::from(out));
        assert!(args.iter().any(|a| a == "copy"));
        assert!(args.iter().any(|a| a == "-an"));
        assert!(!args.iter().any(|a| a == "-framerate"));
        // Muxer named right before the output
        assert_eq!(args[args.len() - 3], OsString::from("-f"));
        assert_eq!(args[args.len() - 2], OsString::from("mp4"));
    }

    #[test]
    fn test_args_with_framerate() {
        let converter = FfmpegConverter::new().framerate(30);
        let args = converter.args(Path::new("a.h264"), Path::new("a.mp4"));

        let fps_pos = args.iter().position(|a| a == "-framerate").unwrap();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[fps_pos + 1], OsString::from("30"));
        // Input options precede the input they apply to
        assert!(fps_pos < input_pos);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("seg.h264");
        std::fs::write(&raw, b"raw").unwrap();

        let converter = FfmpegConverter::with_program(dir.path().join("no-such-ffmpeg"));
        let err = converter.convert(&raw).await.unwrap_err();

        assert!(matches!(err, ConversionError::Launch(_)));
        assert!(raw.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_keeps_input_and_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("seg.h264");
        std::fs::write(&raw, b"raw").unwrap();
        // Simulate a partial container left by a crashed remux
        std::fs::write(dir.path().join("seg.mp4.part"), b"partial").unwrap();

        let converter = FfmpegConverter::with_program("false");
        let err = converter.convert(&raw).await.unwrap_err();

        assert!(matches!(err, ConversionError::Failed { .. }));
        assert!(raw.exists());
        assert!(!dir.path().join("seg.mp4.part").exists());
        assert!(!dir.path().join("seg.mp4").exists());
    }

    /// Write an executable stand-in for ffmpeg that runs `body` with the
    /// output path in `$out`
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg");
        let text = format!("#!/bin/sh\nfor out; do :; done\n{}\n", body);
        std::fs::write(&script, text).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_container_not_listed_while_converting() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("2024-05-01_13-00-00.h264");
        std::fs::write(&raw, b"raw").unwrap();

        let program = fake_ffmpeg(bin.path(), "printf partial > \"$out\"\nsleep 1\nexit 1");
        let converter = FfmpegConverter::with_program(program);
        let task = {
            let raw = raw.clone();
            tokio::spawn(async move { converter.convert(&raw).await })
        };

        // Wait until ffmpeg has started writing
        let partial = FfmpegConverter::partial_path(&raw);
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !partial.exists() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let store = crate::store::RecordingStore::new(dir.path());
        let listed: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name.as_str().to_string(), e.is_playable()))
            .collect();
        assert_eq!(listed, vec![("2024-05-01_13-00-00.h264".to_string(), false)]);

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ConversionError::Failed { .. }));
        assert!(raw.exists());
        assert!(!partial.exists());
        assert!(!FfmpegConverter::output_path(&raw).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_renames_into_place() {
        let bin = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("seg.h264");
        std::fs::write(&raw, b"raw").unwrap();

        let program = fake_ffmpeg(bin.path(), "printf container > \"$out\"");
        let converter = FfmpegConverter::with_program(program);
        let output = converter.convert(&raw).await.unwrap();

        assert_eq!(output, dir.path().join("seg.mp4"));
        assert_eq!(std::fs::read(&output).unwrap(), b"container");
        assert!(!FfmpegConverter::partial_path(&raw).exists());
        // Input is left for the caller to delete
        assert!(raw.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("seg.h264");
        std::fs::write(&raw, b"raw").unwrap();

        let converter = FfmpegConverter::with_program("true");
        let err = converter.convert(&raw).await.unwrap_err();

        assert!(matches!(err, ConversionError::MissingOutput(_)));
        assert!(raw.exists());
    }
}
