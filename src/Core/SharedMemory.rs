// Backing memory for the slot store: a plain aligned heap allocation or a
// file mapped with mmap(MAP_SHARED).

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::ptr::NonNull;

/// Alignment of every backing region. Matches the header alignment.
pub const REGION_ALIGN: usize = 128;

/// Backing memory abstraction shared by heap and mapped regions.
///
/// The region is owned by exactly one `SlotStore`; producers and consumers only
/// ever receive borrowed views into it. Freeing or unmapping happens in `Drop`.
pub trait MemoryBackend: Send + Sync + Debug {
    /// Get a pointer to the start of the region
    fn as_ptr(&self) -> *mut u8;

    /// Get the size of the region in bytes
    fn size(&self) -> usize;

    /// Get the underlying OS handle, if any
    fn raw_handle(&self) -> RawHandle;

    /// Push dirty pages to the backing file. No-op for anonymous memory.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Process-private heap allocation
    Heap,
    /// Unix file descriptor of the mapped file
    Fd(i32),
}

/// Zeroed heap allocation aligned to `REGION_ALIGN`.
#[derive(Debug)]
pub struct HeapMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The region is plain bytes; synchronisation is the sequence protocol's job.
unsafe impl Send for HeapMemory {}
unsafe impl Sync for HeapMemory {}

impl HeapMemory {
    pub fn new(size: usize) -> io::Result<Self> {
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "backing region must not be empty",
            ));
        }
        let layout = Layout::from_size_align(size, REGION_ALIGN)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("failed to allocate {} byte region", size),
            )
        })?;
        Ok(Self { ptr, layout })
    }
}

impl Drop for HeapMemory {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl MemoryBackend for HeapMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.layout.size()
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Heap
    }
}

/// A file mapped read/write and shared, so writes land in the page cache.
#[cfg(unix)]
#[derive(Debug)]
pub struct MappedFile {
    ptr: NonNull<u8>,
    size: usize,
    fd: i32,
}

#[cfg(unix)]
unsafe impl Send for MappedFile {}
#[cfg(unix)]
unsafe impl Sync for MappedFile {}

#[cfg(unix)]
impl MappedFile {
    /// Create (or truncate) `path` to exactly `size` zeroed bytes and map it.
    pub fn create(path: &Path, size: usize) -> io::Result<Self> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to create mapped file at {}: {}", path.display(), e),
                )
            })?;
        file.set_len(size as u64)?;
        Self::map(file, size)
    }

    /// Map an existing file in full. Fails if it is shorter than `min_size`.
    pub fn open(path: &Path, min_size: usize) -> io::Result<Self> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!("Failed to open mapped file at {}: {}", path.display(), e),
                )
            })?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < min_size || file_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Mapped file too small: expected at least {} bytes, got {}",
                    min_size, file_size
                ),
            ));
        }
        Self::map(file, file_size)
    }

    fn map(file: std::fs::File, size: usize) -> io::Result<Self> {
        use std::os::fd::IntoRawFd;

        let fd = file.into_raw_fd();
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // mmap hands back page-aligned memory; anything else is unusable.
        if (ptr as usize) % REGION_ALIGN != 0 {
            unsafe {
                libc::munmap(ptr, size);
                libc::close(fd);
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Mapped region not properly aligned",
            ));
        }

        Ok(Self {
            // MAP_FAILED was ruled out above, and mmap never returns null on success.
            ptr: NonNull::new(ptr as *mut u8)
                .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?,
            size,
            fd,
        })
    }
}

#[cfg(unix)]
impl Drop for MappedFile {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            libc::close(self.fd);
        }
    }
}

#[cfg(unix)]
impl MemoryBackend for MappedFile {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }

    fn flush(&self) -> io::Result<()> {
        let rc = unsafe {
            libc::msync(
                self.ptr.as_ptr() as *mut libc::c_void,
                self.size,
                libc::MS_SYNC,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Create a fresh mapped region at `path`.
#[cfg(unix)]
pub fn create_mapped(path: &Path, size: usize) -> io::Result<Box<dyn MemoryBackend>> {
    Ok(Box::new(MappedFile::create(path, size)?))
}

/// Map an existing file at `path`.
#[cfg(unix)]
pub fn open_mapped(path: &Path, min_size: usize) -> io::Result<Box<dyn MemoryBackend>> {
    Ok(Box::new(MappedFile::open(path, min_size)?))
}

#[cfg(not(unix))]
pub fn create_mapped(_path: &Path, _size: usize) -> io::Result<Box<dyn MemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Mapped backing only supported on unix",
    ))
}

#[cfg(not(unix))]
pub fn open_mapped(_path: &Path, _min_size: usize) -> io::Result<Box<dyn MemoryBackend>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Mapped backing only supported on unix",
    ))
}

/// Allocate a heap region.
pub fn create_heap(size: usize) -> io::Result<Box<dyn MemoryBackend>> {
    Ok(Box::new(HeapMemory::new(size)?))
}
