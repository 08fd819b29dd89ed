//! Append-only op storage.
//!
//! Payloads of mixed sizes live in one byte arena; a parallel index records
//! each op's kind and payload offset. Slot zero holds a no-op sentinel so
//! tail inspection never needs an emptiness check.

use bytemuck::Pod;

use super::OpKind;

#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: u32,
    kind: OpKind,
}

/// A recorded sequence of render ops.
#[derive(Debug)]
pub struct OpBuffer {
    bytes: Vec<u8>,
    index: Vec<Entry>,
}

impl OpBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            index: vec![Entry { offset: 0, kind: OpKind::Noop }],
        }
    }

    /// Number of recorded ops, excluding the sentinel.
    pub fn len(&self) -> usize {
        self.index.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte capacity of the payload arena, for diagnostics.
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    /// Drop all ops but keep both allocations for the next frame.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.index.truncate(1);
    }

    pub fn append<T: Pod>(&mut self, kind: OpKind, payload: &T) {
        debug_assert!(kind != OpKind::Noop);
        self.index.push(Entry {
            offset: self.bytes.len() as u32,
            kind,
        });
        self.bytes.extend_from_slice(bytemuck::bytes_of(payload));
    }

    /// Append an op that carries no payload.
    pub fn append_empty(&mut self, kind: OpKind) {
        debug_assert!(kind != OpKind::Noop);
        self.index.push(Entry {
            offset: self.bytes.len() as u32,
            kind,
        });
    }

    /// Kind of the most recently appended op; `Noop` for an empty buffer.
    pub fn tail_kind(&self) -> OpKind {
        self.index[self.index.len() - 1].kind
    }

    /// Read the tail op's payload. The caller must have checked
    /// [`tail_kind`](Self::tail_kind) so `T` matches the stored layout.
    pub fn read_tail<T: Pod>(&self) -> T {
        let off = self.index[self.index.len() - 1].offset as usize;
        // Payloads are packed unaligned in the arena.
        bytemuck::pod_read_unaligned(&self.bytes[off..])
    }

    /// Overwrite the tail op's payload in place.
    pub fn write_tail<T: Pod>(&mut self, payload: &T) {
        let off = self.index[self.index.len() - 1].offset as usize;
        debug_assert_eq!(self.bytes.len() - off, std::mem::size_of::<T>());
        self.bytes[off..].copy_from_slice(bytemuck::bytes_of(payload));
    }

    /// Remove the tail op. Does nothing when only the sentinel remains.
    pub fn pop_tail(&mut self) {
        if self.index.len() <= 1 {
            debug_assert!(false, "pop_tail on empty op buffer");
            return;
        }
        let entry = self.index.pop();
        if let Some(entry) = entry {
            self.bytes.truncate(entry.offset as usize);
        }
    }

    /// Iterate recorded ops in append order as `(kind, payload bytes)`.
    pub fn iter(&self) -> impl Iterator<Item = (OpKind, &[u8])> + '_ {
        (1..self.index.len()).map(move |i| {
            let entry = self.index[i];
            let start = entry.offset as usize;
            let end = if i + 1 < self.index.len() {
                self.index[i + 1].offset as usize
            } else {
                self.bytes.len()
            };
            (entry.kind, &self.bytes[start..end])
        })
    }
}

impl Default for OpBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{DrawOp, OpacityOp, ProgramOp};

    #[test]
    fn starts_empty_with_noop_tail() {
        let buf = OpBuffer::new();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.tail_kind(), OpKind::Noop);
    }

    #[test]
    fn append_then_read_tail() {
        let mut buf = OpBuffer::new();
        buf.append(OpKind::Program, &ProgramOp { program: 3 });
        buf.append(OpKind::Opacity, &OpacityOp { value: 0.5 });
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.tail_kind(), OpKind::Opacity);
        assert_eq!(buf.read_tail::<OpacityOp>(), OpacityOp { value: 0.5 });
    }

    #[test]
    fn write_tail_overwrites_in_place() {
        let mut buf = OpBuffer::new();
        buf.append(OpKind::Draw, &DrawOp { first: 0, count: 4 });
        buf.write_tail(&DrawOp { first: 0, count: 8 });
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.read_tail::<DrawOp>(), DrawOp { first: 0, count: 8 });
    }

    #[test]
    fn pop_tail_restores_previous_tail() {
        let mut buf = OpBuffer::new();
        buf.append(OpKind::Program, &ProgramOp { program: 1 });
        buf.append(OpKind::Opacity, &OpacityOp { value: 0.25 });
        buf.pop_tail();
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.tail_kind(), OpKind::Program);
        assert_eq!(buf.read_tail::<ProgramOp>(), ProgramOp { program: 1 });
    }

    #[test]
    fn iterates_in_append_order_with_payload_sizes() {
        let mut buf = OpBuffer::new();
        buf.append(OpKind::Program, &ProgramOp { program: 7 });
        buf.append_empty(OpKind::DebugPop);
        buf.append(OpKind::Draw, &DrawOp { first: 4, count: 4 });

        let ops: Vec<(OpKind, usize)> = buf.iter().map(|(k, p)| (k, p.len())).collect();
        assert_eq!(
            ops,
            vec![
                (OpKind::Program, 4),
                (OpKind::DebugPop, 0),
                (OpKind::Draw, 8),
            ]
        );
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut buf = OpBuffer::new();
        for i in 0..32 {
            buf.append(OpKind::Draw, &DrawOp { first: i * 4, count: 4 });
        }
        let cap = buf.capacity();
        assert!(cap > 0);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.tail_kind(), OpKind::Noop);
        assert_eq!(buf.capacity(), cap);
    }
}
