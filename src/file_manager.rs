//! Opens files under a database directory; reads/writes/appends whole blocks.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use parking_lot::Mutex;
use snafu::ResultExt;

use crate::{
    block::BlockId,
    errors::{DbResult, IoSnafu},
    page::Page,
};

/// Opens, reads, writes, and appends the fixed-size blocks that make up
/// every file (data file or log file) in a database directory.
///
/// Every public operation is serialized through a single mutex guarding the
/// map of already-open file handles, so `FileManager` is safe to share
/// across threads without the caller doing anything further.
pub struct FileManager {
    db_directory: PathBuf,
    block_size: usize,
    is_new: bool,
    open_files: Mutex<HashMap<String, File>>,
}

impl FileManager {
    /// Opens (creating if necessary) the database directory, deletes every
    /// file in it whose name starts with `temp`, and returns a manager
    /// ready to read/write/append blocks of `block_size` bytes.
    pub fn new(db_directory: impl Into<PathBuf>, block_size: usize) -> DbResult<Self> {
        let db_directory = db_directory.into();
        let is_new = !db_directory.exists();

        if is_new {
            fs::create_dir_all(&db_directory).context(IoSnafu)?;
        }

        for entry in fs::read_dir(&db_directory).context(IoSnafu)? {
            let entry = entry.context(IoSnafu)?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with("temp") {
                fs::remove_file(entry.path()).context(IoSnafu)?;
            }
        }

        Ok(Self {
            db_directory,
            block_size,
            is_new,
            open_files: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Reads `block` into `page`, zero-filling any bytes past the current
    /// end of file.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> DbResult<()> {
        let mut files = self.open_files.lock();
        let file = self.file_handle(&mut files, block.file_name())?;

        // Start from a zeroed buffer: a short read (block past EOF, or a
        // partially-written final block) must leave the remainder as
        // zeros rather than whatever the page previously contained.
        let mut buf = vec![0u8; self.block_size];
        file.seek(SeekFrom::Start(block.number() as u64 * self.block_size as u64))
            .context(IoSnafu)?;
        let bytes_read = read_fully_or_to_eof(file, &mut buf)?;
        let _ = bytes_read;
        page.contents_mut().copy_from_slice(&buf);
        Ok(())
    }

    pub fn write(&self, block: &BlockId, page: &Page) -> DbResult<()> {
        let mut files = self.open_files.lock();
        let file = self.file_handle(&mut files, block.file_name())?;
        file.seek(SeekFrom::Start(block.number() as u64 * self.block_size as u64))
            .context(IoSnafu)?;
        file.write_all(page.contents()).context(IoSnafu)?;
        Ok(())
    }

    /// Appends one zeroed block to `filename` and returns its `BlockId`.
    pub fn append(&self, filename: &str) -> DbResult<BlockId> {
        let mut files = self.open_files.lock();
        let new_block_number = {
            let file = self.file_handle(&mut files, filename)?;
            file.metadata().context(IoSnafu)?.len() / self.block_size as u64
        };

        let block = BlockId::new(filename, new_block_number as i32);
        let zeros = vec![0u8; self.block_size];
        let file = self.file_handle(&mut files, filename)?;
        file.seek(SeekFrom::Start(new_block_number * self.block_size as u64))
            .context(IoSnafu)?;
        file.write_all(&zeros).context(IoSnafu)?;
        Ok(block)
    }

    /// Length of `filename`, in blocks.
    pub fn length(&self, filename: &str) -> DbResult<u64> {
        let mut files = self.open_files.lock();
        let file = self.file_handle(&mut files, filename)?;
        Ok(file.metadata().context(IoSnafu)?.len() / self.block_size as u64)
    }

    fn file_handle<'a>(
        &self,
        files: &'a mut HashMap<String, File>,
        filename: &str,
    ) -> DbResult<&'a mut File> {
        if !files.contains_key(filename) {
            let path = self.path_for(filename);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)
                .context(IoSnafu)?;
            files.insert(filename.to_string(), file);
        }
        Ok(files.get_mut(filename).expect("just inserted"))
    }

    fn path_for(&self, filename: &str) -> PathBuf {
        self.db_directory.join(filename)
    }
}

fn read_fully_or_to_eof(file: &mut File, buf: &mut [u8]) -> DbResult<usize> {
    let mut total = 0;
    loop {
        match file.read(&mut buf[total..]).context(IoSnafu)? {
            0 => return Ok(total),
            n => {
                total += n;
                if total == buf.len() {
                    return Ok(total);
                }
            }
        }
    }
}
