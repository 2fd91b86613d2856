use crate::util::constants::BYTES_IN_WORD;
use strum_macros::IntoStaticStr;

/// Which allocation path failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoStaticStr)]
pub enum AllocType {
    /// A mutator allocation outside its local buffer.
    #[strum(to_string = "Shared")]
    Shared,
    /// A mutator's thread-local allocation buffer.
    #[strum(to_string = "TLAB")]
    Tlab,
    /// A collector allocation outside its local buffer.
    #[strum(to_string = "Shared GC")]
    SharedGc,
    /// A collector's thread-local allocation buffer.
    #[strum(to_string = "GCLAB")]
    Gclab,
    /// A promotion buffer in the old generation.
    #[strum(to_string = "PLAB")]
    Plab,
}

/// An allocation that could not be satisfied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocRequest {
    /// In words.
    size: usize,
    alloc_type: AllocType,
}

impl AllocRequest {
    pub fn new(size: usize, alloc_type: AllocType) -> Self {
        Self { size, alloc_type }
    }

    pub fn for_shared(size: usize) -> Self {
        Self::new(size, AllocType::Shared)
    }

    pub fn for_tlab(size: usize) -> Self {
        Self::new(size, AllocType::Tlab)
    }

    /// Requested size in words.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size * BYTES_IN_WORD
    }

    pub fn alloc_type(&self) -> AllocType {
        self.alloc_type
    }

    pub fn type_string(&self) -> &'static str {
        self.alloc_type.into()
    }

    pub fn is_mutator_alloc(&self) -> bool {
        matches!(self.alloc_type, AllocType::Shared | AllocType::Tlab)
    }

    pub fn is_gc_alloc(&self) -> bool {
        !self.is_mutator_alloc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_itself() {
        let req = AllocRequest::for_tlab(16);
        assert_eq!(req.type_string(), "TLAB");
        assert_eq!(req.size_in_bytes(), 16 * BYTES_IN_WORD);
        assert!(req.is_mutator_alloc());
        assert!(AllocRequest::new(2, AllocType::Plab).is_gc_alloc());
    }
}
