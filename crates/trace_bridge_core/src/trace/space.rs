use super::lifespan::{IntervalMap, Lifespan, Snap};
use std::collections::BTreeMap;

/// Register values of one registers object, big-endian, by register name.
#[derive(Debug, Clone, Default)]
pub struct RegisterSpace {
    registers: BTreeMap<String, IntervalMap<Vec<u8>>>,
}

impl RegisterSpace {
    pub fn set(&mut self, name: &str, span: Lifespan, bytes: Vec<u8>) {
        self.registers
            .entry(name.to_string())
            .or_default()
            .set(span, bytes);
    }

    pub fn get(&self, snap: Snap, name: &str) -> Option<&[u8]> {
        self.registers
            .get(name)
            .and_then(|history| history.get(snap))
            .map(Vec::as_slice)
    }

    /// The register value as an unsigned integer, if it fits.
    pub fn get_u64(&self, snap: Snap, name: &str) -> Option<u64> {
        let bytes = self.get(snap, name)?;
        if bytes.len() > 8 {
            return None;
        }
        Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.registers.keys().map(String::as_str)
    }

    pub fn end_at(&mut self, snap: Snap) {
        for history in self.registers.values_mut() {
            history.end_at(snap);
        }
    }
}

/// Bytes read from one process's memory, in blocks keyed by start offset.
#[derive(Debug, Clone, Default)]
pub struct MemorySpace {
    blocks: BTreeMap<u64, IntervalMap<Vec<u8>>>,
}

impl MemorySpace {
    pub fn write(&mut self, span: Lifespan, offset: u64, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.blocks.entry(offset).or_default().set(span, bytes);
    }

    /// Reads `len` bytes at `offset` as of `snap`. Returns `None` unless every
    /// byte is covered by some recorded block; later-starting blocks win.
    pub fn read(&self, snap: Snap, offset: u64, len: usize) -> Option<Vec<u8>> {
        let end = offset.checked_add(len as u64)?;
        let mut out = vec![0u8; len];
        let mut known = vec![false; len];

        for (&start, history) in self.blocks.range(..end) {
            let Some(block) = history.get(snap) else {
                continue;
            };
            let block_end = start.saturating_add(block.len() as u64);
            if block_end <= offset {
                continue;
            }
            let from = start.max(offset);
            let to = block_end.min(end);
            for addr in from..to {
                let dst = (addr - offset) as usize;
                out[dst] = block[(addr - start) as usize];
                known[dst] = true;
            }
        }
        known.iter().all(|k| *k).then_some(out)
    }

    pub fn end_at(&mut self, snap: Snap) {
        for history in self.blocks.values_mut() {
            history.end_at(snap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_history() {
        let mut regs = RegisterSpace::default();
        regs.set("rip", Lifespan::now_on(1), vec![0x00, 0x40, 0x10, 0x00]);
        regs.set("rip", Lifespan::now_on(3), vec![0x00, 0x40, 0x10, 0x05]);
        assert_eq!(regs.get_u64(2, "rip"), Some(0x401000));
        assert_eq!(regs.get_u64(3, "rip"), Some(0x401005));
        assert_eq!(regs.get(0, "rip"), None);
        assert_eq!(regs.names().collect::<Vec<_>>(), vec!["rip"]);
    }

    #[test]
    fn test_memory_read_needs_full_coverage() {
        let mut mem = MemorySpace::default();
        mem.write(Lifespan::now_on(1), 0x1000, vec![1, 2, 3, 4]);
        mem.write(Lifespan::now_on(1), 0x1004, vec![5, 6]);
        assert_eq!(mem.read(1, 0x1002, 4), Some(vec![3, 4, 5, 6]));
        assert_eq!(mem.read(1, 0x1004, 4), None);
        assert_eq!(mem.read(0, 0x1000, 1), None);
    }

    #[test]
    fn test_memory_later_block_wins() {
        let mut mem = MemorySpace::default();
        mem.write(Lifespan::now_on(1), 0x10, vec![0xaa; 4]);
        mem.write(Lifespan::now_on(1), 0x12, vec![0xbb]);
        assert_eq!(mem.read(1, 0x10, 4), Some(vec![0xaa, 0xaa, 0xbb, 0xaa]));
    }
}
