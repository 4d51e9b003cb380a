//! Thumbnail blob packer
//!
//! Every thumbnail format has one flat file holding concatenated pixel
//! blobs. The database records each blob's `(offset, size)`; this module is
//! the only code that decides offsets, and it keeps them from overlapping.
//!
//! A save reuses the slots of removed blobs before growing the file: a
//! freed slot takes a pending blob when one fits, otherwise the last stored
//! blob moves down into it when it sits after the gap, otherwise a gap at the
//! tail just shortens the file.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Random-access storage behind a thumbnail file
pub trait BlobFile {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>>;

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()>;

    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl BlobFile for File {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(data)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl BlobFile for Vec<u8> {
    fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let start = offset as usize;
        self.get(start..start + len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "blob past end of file"))
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        let start = offset as usize;
        if self.len() < start + data.len() {
            self.resize(start + data.len(), 0);
        }
        self[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.resize(len as usize, 0);
        Ok(())
    }
}

/// A blob already in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub offset: u32,
    pub size: u32,
    /// New pixels to write over the blob in place
    pub rewrite: Option<Vec<u8>>,
}

impl StoredBlob {
    pub fn new(offset: u32, size: u32) -> Self {
        Self {
            offset,
            size,
            rewrite: None,
        }
    }

    fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

/// A blob waiting for a slot; `offset` is filled in by [`pack`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBlob {
    pub data: Vec<u8>,
    pub offset: Option<u32>,
}

impl PendingBlob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, offset: None }
    }

    fn size(&self) -> u32 {
        self.data.len() as u32
    }
}

/// The slot of a blob removed since the last save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreedSlot {
    pub offset: u32,
    pub size: u32,
}

impl FreedSlot {
    fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

/// Lay out one thumbnail file and write it.
///
/// Updates `stored[..].offset` for relocated blobs and
/// `pending[..].offset` for placed blobs. Returns the final file length.
/// With nothing pending, freed or rewritten the file is left untouched.
pub fn pack<F: BlobFile>(
    file: &mut F,
    stored: &mut [StoredBlob],
    pending: &mut [PendingBlob],
    freed: &[FreedSlot],
) -> io::Result<u64> {
    let layout_end = stored
        .iter()
        .map(StoredBlob::end)
        .chain(freed.iter().map(FreedSlot::end))
        .max()
        .unwrap_or(0);

    let has_rewrites = stored.iter().any(|b| b.rewrite.is_some());
    if pending.is_empty() && freed.is_empty() && !has_rewrites {
        return Ok(layout_end);
    }

    let mut file_len = layout_end;

    let mut gaps = freed.to_vec();
    gaps.sort_by(|a, b| b.offset.cmp(&a.offset));

    for gap in gaps {
        if let Some(blob) = pending
            .iter_mut()
            .find(|b| b.offset.is_none() && b.size() <= gap.size)
        {
            file.write_at(gap.offset as u64, &blob.data)?;
            blob.offset = Some(gap.offset);
            log::debug!("Placed {} byte blob in freed slot at {}", blob.size(), gap.offset);
            continue;
        }

        let last = stored
            .iter()
            .enumerate()
            .max_by_key(|(_, b)| b.offset)
            .map(|(i, _)| i);
        if let Some(index) = last {
            let blob = &mut stored[index];
            if blob.offset > gap.offset && blob.size <= gap.size {
                let data = match blob.rewrite.take() {
                    Some(data) => data,
                    None => file.read_at(blob.offset as u64, blob.size as usize)?,
                };
                file.write_at(gap.offset as u64, &data)?;
                log::debug!("Moved blob at {} down to {}", blob.offset, gap.offset);
                if blob.end() == file_len {
                    file_len -= blob.size as u64;
                }
                blob.offset = gap.offset;
                continue;
            }
        }

        if gap.end() == file_len {
            file_len = gap.offset as u64;
        }
    }

    for blob in pending.iter_mut().filter(|b| b.offset.is_none()) {
        file.write_at(file_len, &blob.data)?;
        blob.offset = Some(file_len as u32);
        file_len += blob.size() as u64;
    }

    for blob in stored.iter_mut() {
        if let Some(data) = blob.rewrite.take() {
            file.write_at(blob.offset as u64, &data)?;
        }
    }

    file.set_len(file_len)?;
    Ok(file_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(blobs: &[(u8, u32)]) -> (Vec<u8>, Vec<StoredBlob>) {
        let mut file = Vec::new();
        let mut stored = Vec::new();
        for &(fill, size) in blobs {
            stored.push(StoredBlob::new(file.len() as u32, size));
            file.extend(std::iter::repeat(fill).take(size as usize));
        }
        (file, stored)
    }

    #[test]
    fn test_no_changes_is_idempotent() {
        let (mut file, mut stored) = file_with(&[(1, 8), (2, 8), (3, 8)]);
        let before = stored.clone();
        let len = pack(&mut file, &mut stored, &mut [], &[]).unwrap();
        assert_eq!(len, 24);
        assert_eq!(file.len(), 24);
        assert_eq!(stored, before);
    }

    #[test]
    fn test_pending_blob_fills_freed_tail() {
        let (mut file, mut stored) = file_with(&[(1, 8), (2, 8), (3, 8)]);
        let removed = stored.pop().unwrap();
        let mut pending = vec![PendingBlob::new(vec![9; 8])];

        let len = pack(
            &mut file,
            &mut stored,
            &mut pending,
            &[FreedSlot {
                offset: removed.offset,
                size: removed.size,
            }],
        )
        .unwrap();

        assert_eq!(len, 24);
        assert_eq!(pending[0].offset, Some(16));
        assert_eq!(&file[16..24], &[9; 8]);
    }

    #[test]
    fn test_smaller_pending_blob_does_not_grow_file() {
        let (mut file, mut stored) = file_with(&[(1, 8), (2, 8)]);
        let removed = stored.pop().unwrap();
        let mut pending = vec![PendingBlob::new(vec![7; 4])];
        let len = pack(
            &mut file,
            &mut stored,
            &mut pending,
            &[FreedSlot {
                offset: removed.offset,
                size: removed.size,
            }],
        )
        .unwrap();
        assert!(len <= 16);
        assert_eq!(pending[0].offset, Some(8));
    }

    #[test]
    fn test_last_blob_moves_into_middle_gap() {
        let (mut file, mut stored) = file_with(&[(1, 8), (2, 8), (3, 8)]);
        let removed = stored.remove(1);

        let len = pack(
            &mut file,
            &mut stored,
            &mut [],
            &[FreedSlot {
                offset: removed.offset,
                size: removed.size,
            }],
        )
        .unwrap();

        assert_eq!(len, 16);
        assert_eq!(file.len(), 16);
        assert_eq!(stored[1].offset, 8);
        assert_eq!(&file[8..16], &[3; 8]);
    }

    #[test]
    fn test_tail_gap_shrinks_file() {
        let (mut file, mut stored) = file_with(&[(1, 8), (2, 8)]);
        let removed = stored.pop().unwrap();
        let len = pack(
            &mut file,
            &mut stored,
            &mut [],
            &[FreedSlot {
                offset: removed.offset,
                size: removed.size,
            }],
        )
        .unwrap();
        assert_eq!(len, 8);
        assert_eq!(file, vec![1; 8]);
    }

    #[test]
    fn test_new_blobs_append_and_rewrites_apply() {
        let (mut file, mut stored) = file_with(&[(1, 4)]);
        stored[0].rewrite = Some(vec![5; 4]);
        let mut pending = vec![PendingBlob::new(vec![6; 4]), PendingBlob::new(vec![7; 4])];

        let len = pack(&mut file, &mut stored, &mut pending, &[]).unwrap();
        assert_eq!(len, 12);
        assert_eq!(pending[0].offset, Some(4));
        assert_eq!(pending[1].offset, Some(8));
        assert_eq!(file, [vec![5; 4], vec![6; 4], vec![7; 4]].concat());
        assert!(stored[0].rewrite.is_none());
    }

    #[test]
    fn test_blobs_never_overlap() {
        let (mut file, mut stored) = file_with(&[(1, 8), (2, 8), (3, 8), (4, 8)]);
        let a = stored.remove(0);
        let b = stored.remove(1);
        let mut pending = vec![PendingBlob::new(vec![9; 8])];
        let freed = [
            FreedSlot { offset: a.offset, size: a.size },
            FreedSlot { offset: b.offset, size: b.size },
        ];
        pack(&mut file, &mut stored, &mut pending, &freed).unwrap();

        let mut spans: Vec<(u32, u32)> = stored
            .iter()
            .map(|s| (s.offset, s.size))
            .chain(pending.iter().map(|p| (p.offset.unwrap(), p.size())))
            .collect();
        spans.sort();
        for pair in spans.windows(2) {
            assert!(pair[0].0 + pair[0].1 <= pair[1].0);
        }
    }
}
