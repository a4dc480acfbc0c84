// File handle open/read/write with explicit modes, cursor control, and advisory locking.
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use libc::{EACCES, EPERM};

use crate::core::error::{Error, ErrorKind, io_error_kind};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Read,
    Write,
    Append,
    CreateNew,
    ReadWrite,
}

impl Mode {
    fn readable(self) -> bool {
        matches!(self, Mode::Read | Mode::ReadWrite)
    }

    fn writable(self) -> bool {
        !matches!(self, Mode::Read)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SeekTo {
    Start(u64),
    Current(i64),
    End(i64),
}

#[derive(Debug)]
pub struct Handle {
    path: PathBuf,
    mode: Mode,
    file: File,
    // Read-ahead buffer; `buf_pos` marks how much the caller has consumed.
    buf: Vec<u8>,
    buf_pos: usize,
}

impl Handle {
    pub fn open(path: impl AsRef<Path>, mode: Mode) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        match mode {
            Mode::Read => {
                options.read(true);
            }
            Mode::Write => {
                options.write(true).create(true).truncate(true);
            }
            Mode::Append => {
                options.append(true).create(true);
            }
            Mode::CreateNew => {
                options.write(true).create_new(true);
            }
            Mode::ReadWrite => {
                options.read(true).write(true);
            }
        }
        let file = options.open(&path).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(Self {
            path,
            mode,
            file,
            buf: Vec::new(),
            buf_pos: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Reads the remainder of the file as UTF-8 text.
    pub fn read_to_string(&mut self) -> Result<String, Error> {
        let bytes = self.read_to_end()?;
        String::from_utf8(bytes).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message("file is not valid UTF-8")
                .with_path(&self.path)
                .with_source(err)
        })
    }

    /// Reads one line including its trailing newline. `Ok(None)` at end of file.
    pub fn read_line(&mut self) -> Result<Option<String>, Error> {
        self.ensure_readable()?;
        let mut line = Vec::new();
        loop {
            if self.buf_pos == self.buf.len() && self.fill_buf()? == 0 {
                if line.is_empty() {
                    return Ok(None);
                }
                break;
            }
            let pending = &self.buf[self.buf_pos..];
            match pending.iter().position(|byte| *byte == b'\n') {
                Some(idx) => {
                    line.extend_from_slice(&pending[..=idx]);
                    self.buf_pos += idx + 1;
                    break;
                }
                None => {
                    line.extend_from_slice(pending);
                    self.buf_pos = self.buf.len();
                }
            }
        }
        let line = String::from_utf8(line).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message("line is not valid UTF-8")
                .with_path(&self.path)
                .with_source(err)
        })?;
        Ok(Some(line))
    }

    /// Reads all remaining lines, in order, with line endings stripped.
    pub fn read_lines(&mut self) -> Result<Vec<String>, Error> {
        let mut lines = Vec::new();
        while let Some(mut line) = self.read_line()? {
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Reads up to `count` bytes; fewer are returned only at end of file.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, Error> {
        self.ensure_readable()?;
        let mut out = Vec::with_capacity(count.min(READ_CHUNK));
        while out.len() < count {
            if self.buf_pos == self.buf.len() && self.fill_buf()? == 0 {
                break;
            }
            let want = count - out.len();
            let available = self.buf.len() - self.buf_pos;
            let take = want.min(available);
            out.extend_from_slice(&self.buf[self.buf_pos..self.buf_pos + take]);
            self.buf_pos += take;
        }
        Ok(out)
    }

    /// Reads all remaining bytes.
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        self.ensure_readable()?;
        let mut out = self.buf.split_off(self.buf_pos);
        self.buf.clear();
        self.buf_pos = 0;
        self.file.read_to_end(&mut out).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        Ok(out)
    }

    pub fn write_str(&mut self, text: &str) -> Result<(), Error> {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.ensure_writable()?;
        self.discard_read_ahead()?;
        self.file.write_all(bytes).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.file.flush().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })
    }

    /// Flushes and forces the OS to write file content to stable storage.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.flush()?;
        self.file.sync_all().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })
    }

    /// Current cursor position as seen by the caller, in bytes from the start.
    pub fn position(&mut self) -> Result<u64, Error> {
        let raw = self.file.stream_position().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        let pending = (self.buf.len() - self.buf_pos) as u64;
        Ok(raw - pending)
    }

    pub fn seek(&mut self, to: SeekTo) -> Result<u64, Error> {
        let target = match to {
            SeekTo::Start(offset) => SeekFrom::Start(offset),
            SeekTo::Current(delta) => {
                let position = self.position()? as i64;
                let next = position.checked_add(delta).ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message("seek offset overflows")
                        .with_path(&self.path)
                })?;
                if next < 0 {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message("seek before start of file")
                        .with_path(&self.path));
                }
                SeekFrom::Start(next as u64)
            }
            SeekTo::End(delta) => SeekFrom::End(delta),
        };
        self.buf.clear();
        self.buf_pos = 0;
        self.file.seek(target).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })
    }

    pub fn rewind(&mut self) -> Result<(), Error> {
        self.seek(SeekTo::Start(0))?;
        Ok(())
    }

    /// Takes an exclusive advisory lock, blocking until it is available.
    pub fn lock_exclusive(&self) -> Result<HandleLock, Error> {
        self.file.lock_exclusive().map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        self.lock_guard()
    }

    /// Like `lock_exclusive` but fails with `Busy` instead of waiting.
    pub fn try_lock_exclusive(&self) -> Result<HandleLock, Error> {
        self.file.try_lock_exclusive().map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        self.lock_guard()
    }

    // The guard owns a duplicated descriptor for the same open file
    // description, so holding it does not borrow the handle.
    fn lock_guard(&self) -> Result<HandleLock, Error> {
        let file = self.file.try_clone().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        Ok(HandleLock { file })
    }

    fn ensure_readable(&self) -> Result<(), Error> {
        if !self.mode.readable() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("handle is not open for reading")
                .with_path(&self.path));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), Error> {
        if !self.mode.writable() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("handle is not open for writing")
                .with_path(&self.path));
        }
        Ok(())
    }

    // The OS cursor sits ahead of the logical position while read-ahead is
    // buffered; writes must land at the logical position.
    fn discard_read_ahead(&mut self) -> Result<(), Error> {
        let pending = (self.buf.len() - self.buf_pos) as i64;
        if pending > 0 {
            self.file
                .seek(SeekFrom::Current(-pending))
                .map_err(|err| {
                    Error::new(io_error_kind(&err))
                        .with_path(&self.path)
                        .with_source(err)
                })?;
        }
        self.buf.clear();
        self.buf_pos = 0;
        Ok(())
    }

    fn fill_buf(&mut self) -> Result<usize, Error> {
        self.buf.clear();
        self.buf_pos = 0;
        self.buf.resize(READ_CHUNK, 0);
        let read = self.file.read(&mut self.buf).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_path(&self.path)
                .with_source(err)
        })?;
        self.buf.truncate(read);
        Ok(read)
    }
}

#[derive(Debug)]
pub struct HandleLock {
    file: File,
}

impl Drop for HandleLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{Handle, Mode, SeekTo};
    use crate::core::error::ErrorKind;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");

        let mut handle = Handle::open(&path, Mode::Write).expect("open write");
        handle.write_str("hello papyra\n").expect("write");
        handle.write_str("file handling is easy").expect("write");
        handle.flush().expect("flush");
        drop(handle);

        let mut handle = Handle::open(&path, Mode::Read).expect("open read");
        let text = handle.read_to_string().expect("read");
        assert_eq!(text, "hello papyra\nfile handling is easy");
    }

    #[test]
    fn read_mode_requires_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.txt");
        let err = Handle::open(&path, Mode::Read).expect_err("missing file");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn create_new_refuses_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("taken.txt");
        std::fs::write(&path, "occupied").expect("seed");
        let err = Handle::open(&path, Mode::CreateNew).expect_err("exclusive create");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn append_adds_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "first\n").expect("seed");

        let mut handle = Handle::open(&path, Mode::Append).expect("open append");
        handle.write_str("second\n").expect("append");
        drop(handle);

        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn read_line_returns_none_at_eof() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lines.txt");
        std::fs::write(&path, "one\ntwo\nthree").expect("seed");

        let mut handle = Handle::open(&path, Mode::Read).expect("open");
        assert_eq!(handle.read_line().expect("line"), Some("one\n".to_string()));
        assert_eq!(handle.read_line().expect("line"), Some("two\n".to_string()));
        assert_eq!(handle.read_line().expect("line"), Some("three".to_string()));
        assert_eq!(handle.read_line().expect("line"), None);
    }

    #[test]
    fn read_lines_strips_endings_and_keeps_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lines.txt");
        std::fs::write(&path, "alpha\r\nbeta\ngamma\n").expect("seed");

        let mut handle = Handle::open(&path, Mode::Read).expect("open");
        let lines = handle.read_lines().expect("lines");
        assert_eq!(lines, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn position_tracks_consumed_bytes_not_read_ahead() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cursor.txt");
        std::fs::write(&path, "0123456789 the rest of the file").expect("seed");

        let mut handle = Handle::open(&path, Mode::Read).expect("open");
        let first = handle.read_bytes(5).expect("read 5");
        assert_eq!(first, b"01234");
        assert_eq!(handle.position().expect("position"), 5);

        handle.seek(SeekTo::Start(0)).expect("seek");
        let again = handle.read_to_string().expect("read all");
        assert!(again.starts_with("0123456789"));
    }

    #[test]
    fn seek_before_start_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cursor.txt");
        std::fs::write(&path, "abc").expect("seed");

        let mut handle = Handle::open(&path, Mode::Read).expect("open");
        let err = handle.seek(SeekTo::Current(-1)).expect_err("before start");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn mode_guards_reject_wrong_direction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("guard.txt");
        std::fs::write(&path, "data").expect("seed");

        let mut reader = Handle::open(&path, Mode::Read).expect("open read");
        let err = reader.write_str("nope").expect_err("write on read handle");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let mut writer = Handle::open(&path, Mode::Write).expect("open write");
        let err = writer.read_to_string().expect_err("read on write handle");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn read_write_mode_interleaves_at_logical_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mixed.txt");
        std::fs::write(&path, "aaaabbbb").expect("seed");

        let mut handle = Handle::open(&path, Mode::ReadWrite).expect("open");
        let head = handle.read_bytes(4).expect("read head");
        assert_eq!(head, b"aaaa");
        handle.write_str("XXXX").expect("overwrite tail");
        drop(handle);

        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text, "aaaaXXXX");
    }

    #[test]
    fn exclusive_lock_is_released_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("locked.txt");
        std::fs::write(&path, "data").expect("seed");

        let first = Handle::open(&path, Mode::Append).expect("open");
        let second = Handle::open(&path, Mode::Append).expect("open");

        let guard = first.lock_exclusive().expect("lock");
        let err = second.try_lock_exclusive().expect_err("contended lock");
        assert_eq!(err.kind(), ErrorKind::Busy);

        drop(guard);
        let _relock = second.try_lock_exclusive().expect("lock after release");
    }
}
