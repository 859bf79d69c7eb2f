use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FountainError {
    #[error("symbol size must be nonzero")]
    BadSymbolSize,
    #[error("repair overhead must be in (0.0, 1.0], got {0}")]
    BadOverhead(f64),
    #[error("{total} symbols exceed the 16-bit esi space")]
    TooManySymbols { total: usize },
    #[error("insufficient symbols: {missing} of {k} sources unrecovered")]
    InsufficientSymbols { missing: usize, k: usize },
}

/// One encoding symbol. Source symbols carry `esi < k`, repair symbols
/// `esi >= k` in parity-group order.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub esi: u16,
    pub is_repair: bool,
    pub data: Vec<u8>,
}

/// Source symbols folded into each repair symbol for a given overhead
/// fraction. Overhead 1.0 duplicates every source symbol; 0.5 covers two
/// sources per repair, and so on.
pub fn parity_group_size(repair_overhead: f64) -> u8 {
    let group = (1.0 / repair_overhead).round();
    if group.is_finite() {
        group.clamp(1.0, 255.0) as u8
    } else {
        255
    }
}

/// Number of source symbols a chunk of `len` bytes cuts into.
pub fn source_symbol_count(len: usize, symbol_size: usize) -> usize {
    ((len + symbol_size - 1) / symbol_size).max(1)
}

/// Encode one chunk into its `k` source symbols (the last one zero-padded)
/// followed by `r` interleaved XOR parity symbols: parity `j` covers the
/// sources `{i : i mod r == j}`, so consecutive symbols never share a group
/// and a lost video frame spreads its damage across many groups. An empty
/// chunk still yields one (all-zero) source symbol so the chunk remains
/// representable on the wire.
pub fn encode_chunk(
    data: &[u8],
    symbol_size: usize,
    repair_overhead: f64,
) -> Result<Vec<Symbol>, FountainError> {
    if symbol_size == 0 {
        return Err(FountainError::BadSymbolSize);
    }
    if !(repair_overhead > 0.0 && repair_overhead <= 1.0) {
        return Err(FountainError::BadOverhead(repair_overhead));
    }

    let k = source_symbol_count(data.len(), symbol_size);
    let group = parity_group_size(repair_overhead) as usize;
    let r = (k + group - 1) / group;
    if k + r > usize::from(u16::MAX) + 1 {
        return Err(FountainError::TooManySymbols { total: k + r });
    }

    let mut symbols = Vec::with_capacity(k + r);
    for i in 0..k {
        let start = i * symbol_size;
        let mut sym = vec![0u8; symbol_size];
        if start < data.len() {
            let end = (start + symbol_size).min(data.len());
            sym[..end - start].copy_from_slice(&data[start..end]);
        }
        symbols.push(Symbol {
            esi: i as u16,
            is_repair: false,
            data: sym,
        });
    }
    for j in 0..r {
        let mut parity = vec![0u8; symbol_size];
        for i in (j..k).step_by(r) {
            xor_into(&mut parity, &symbols[i].data);
        }
        symbols.push(Symbol {
            esi: (k + j) as u16,
            is_repair: true,
            data: parity,
        });
    }
    Ok(symbols)
}

/// Collects received symbols for one chunk and rebuilds the original bytes.
pub struct ChunkDecoder {
    k: usize,
    symbol_size: usize,
    repair_count: usize,
    sources: Vec<Option<Vec<u8>>>,
    repairs: Vec<Option<Vec<u8>>>,
}

impl ChunkDecoder {
    pub fn new(k: usize, symbol_size: usize, parity_group: u8) -> Self {
        let group = (parity_group as usize).max(1);
        let repair_count = (k + group - 1) / group;
        Self {
            k,
            symbol_size,
            repair_count,
            sources: vec![None; k],
            repairs: vec![None; repair_count],
        }
    }

    /// Record one received symbol. Duplicates keep the first copy; symbols
    /// whose esi falls outside this chunk's symbol space are dropped.
    pub fn add_symbol(&mut self, esi: u16, payload: &[u8], is_repair: bool) {
        let esi = esi as usize;
        if is_repair != (esi >= self.k) {
            debug!("dropping symbol with inconsistent esi {} / repair flag", esi);
            return;
        }

        let mut data = payload.to_vec();
        data.resize(self.symbol_size, 0);

        if esi < self.k {
            if self.sources[esi].is_none() {
                self.sources[esi] = Some(data);
            }
        } else if esi - self.k < self.repair_count {
            let j = esi - self.k;
            if self.repairs[j].is_none() {
                self.repairs[j] = Some(data);
            }
        } else {
            debug!("dropping symbol with out-of-range esi {}", esi);
        }
    }

    /// Count of source symbols still unaccounted for, before repair.
    pub fn missing_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_none()).count()
    }

    /// Rebuild the chunk's first `chunk_len` bytes. Each parity group can
    /// restore at most one lost source; anything beyond that reports how many
    /// sources remain missing so the caller can keep feeding symbols.
    pub fn recover(&self, chunk_len: usize) -> Result<Vec<u8>, FountainError> {
        let r = self.repair_count;
        let mut sources = self.sources.clone();

        for (j, repair) in self.repairs.iter().enumerate() {
            if let Some(repair) = repair {
                let missing: Vec<usize> = (j..self.k)
                    .step_by(r)
                    .filter(|&i| sources[i].is_none())
                    .collect();
                if missing.len() != 1 {
                    continue;
                }
                let mut rebuilt = repair.clone();
                for i in (j..self.k).step_by(r) {
                    if let Some(sym) = &sources[i] {
                        xor_into(&mut rebuilt, sym);
                    }
                }
                sources[missing[0]] = Some(rebuilt);
            }
        }

        let missing = sources.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            return Err(FountainError::InsufficientSymbols { missing, k: self.k });
        }

        let mut out = Vec::with_capacity(self.k * self.symbol_size);
        for sym in sources.into_iter().flatten() {
            out.extend_from_slice(&sym);
        }
        out.truncate(chunk_len);
        Ok(out)
    }
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}
