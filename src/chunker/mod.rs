use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// One fixed-size slice of the input file. Only the final chunk may be
/// shorter than the configured chunk size.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: u32,
    pub data: Vec<u8>,
    pub is_last: bool,
}

/// Split a file into `chunk_size`-byte chunks without holding more than one
/// chunk of the file in memory at a time. An empty file yields a single
/// empty chunk so it still travels through the rest of the pipeline.
pub fn chunk_file(path: &Path, chunk_size: usize) -> io::Result<Vec<Chunk>> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len() as usize;
    let count = ((file_len + chunk_size - 1) / chunk_size).max(1);

    let mut reader = BufReader::with_capacity(chunk_size.min(1 << 20), file);
    let mut chunks = Vec::with_capacity(count);
    for index in 0..count {
        let start = index * chunk_size;
        let mut data = vec![0u8; chunk_size.min(file_len - start)];
        reader.read_exact(&mut data)?;
        chunks.push(Chunk {
            index: index as u32,
            data,
            is_last: index == count - 1,
        });
    }
    Ok(chunks)
}

/// Split an in-memory buffer the same way `chunk_file` splits a file.
pub fn chunk_bytes(data: &[u8], chunk_size: usize) -> Vec<Chunk> {
    if data.is_empty() {
        return vec![Chunk {
            index: 0,
            data: Vec::new(),
            is_last: true,
        }];
    }

    let count = (data.len() + chunk_size - 1) / chunk_size;
    data.chunks(chunk_size)
        .enumerate()
        .map(|(i, slice)| Chunk {
            index: i as u32,
            data: slice.to_vec(),
            is_last: i == count - 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn splits_buffer_with_short_tail() {
        let data = vec![0xABu8; 2500];
        let chunks = chunk_bytes(&data, 1000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].data.len(), 1000);
        assert_eq!(chunks[2].data.len(), 500);
        assert!(!chunks[0].is_last);
        assert!(!chunks[1].is_last);
        assert!(chunks[2].is_last);
    }

    #[test]
    fn exact_multiple_marks_final_chunk() {
        let chunks = chunk_bytes(&vec![0u8; 2048], 1024);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].data.len(), 1024);
        assert!(chunks[1].is_last);
    }

    #[test]
    fn empty_buffer_yields_one_empty_chunk() {
        let chunks = chunk_bytes(&[], 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert!(chunks[0].data.is_empty());
        assert!(chunks[0].is_last);
    }

    #[test]
    fn file_chunks_reassemble_to_the_original() {
        let dir = std::env::temp_dir().join("framevault_test_chunker");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("input.bin");

        let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&data).unwrap();
        }

        let chunks = chunk_file(&path, 2000).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let mut reassembled = Vec::new();
        for c in &chunks {
            reassembled.extend_from_slice(&c.data);
        }
        assert_eq!(reassembled, data);
        assert!(chunks.last().unwrap().is_last);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_file_yields_one_empty_chunk() {
        let dir = std::env::temp_dir().join("framevault_test_chunker_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("empty.bin");
        File::create(&path).unwrap();

        let chunks = chunk_file(&path, 4096).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].data.is_empty());
        assert!(chunks[0].is_last);

        std::fs::remove_dir_all(&dir).ok();
    }
}
