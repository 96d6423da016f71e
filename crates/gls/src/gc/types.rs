//! Type descriptors (spec.md §3 "Type descriptor").

/// How a field participates in GC scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcFieldTag {
    /// Not inspected by the collector.
    None,
    /// Holds a tagged `Val`; rewritten through the `Val` constructors.
    Tagged,
    /// Holds a naked GC pointer (no tag bits); rewritten directly.
    Raw,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub offset: u32,
    pub size: u32,
    pub gc_tag: GcFieldTag,
}

/// Describes the trailing variable-length array some types carry: the byte
/// offset of a `u32` length prefix and the size of each element.
#[derive(Debug, Clone, Copy)]
pub struct ResizableField {
    pub length_offset: u32,
    pub element_size: u32,
    pub element_gc_tag: GcFieldTag,
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub align: u32,
    pub base_size: u32,
    pub resizable: Option<ResizableField>,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn fixed(name: &'static str, align: u32, base_size: u32, fields: Vec<FieldDescriptor>) -> TypeDescriptor {
        TypeDescriptor { name, align, base_size, resizable: None, fields }
    }

    pub fn array(
        name: &'static str,
        align: u32,
        base_size: u32,
        resizable: ResizableField,
        fields: Vec<FieldDescriptor>,
    ) -> TypeDescriptor {
        TypeDescriptor { name, align, base_size, resizable: Some(resizable), fields }
    }

    /// Total object size for a given array length (0 for non-resizable types).
    pub fn size_for(&self, length: u32) -> u32 {
        match &self.resizable {
            Some(r) => self.base_size + length * r.element_size,
            None => self.base_size,
        }
    }
}

pub type TypeIndex = u32;
