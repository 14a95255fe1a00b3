//! Method bodies, exception tables and the symbol tables they index into.
//!
//! A [`CompilationUnit`] is everything the builders need to know about one
//! method: its [`CodeItem`] (or none, for a synthetic minimal body), whether it
//! is static, and the shared [`SymbolTable`] that gives meaning to the type,
//! field and method indices embedded in instructions.

use crate::{
    bytecode::{Instruction, Register},
    types::DataType,
    Result,
};

/// Descriptor of the string class, used to recognize string construction.
pub const STRING_DESCRIPTOR: &str = "Ljava/lang/String;";

/// Name of instance constructors.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// One catch clause of a try item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchHandler {
    /// Caught type index, `None` for a catch-all clause
    pub type_index: Option<u32>,
    /// Offset of the handler's first instruction
    pub address: u32,
}

/// A protected range with its handlers, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryItem {
    /// First covered offset
    pub start: u32,
    /// First offset past the range
    pub end: u32,
    /// Handlers in the order they are tried
    pub handlers: Vec<CatchHandler>,
}

impl TryItem {
    /// Returns `true` if `offset` lies inside the protected range.
    #[must_use]
    pub fn covers(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A method body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeItem {
    /// Total number of virtual registers
    pub registers: u16,
    /// Number of incoming argument registers (the last `ins` registers)
    pub ins: u16,
    /// Outgoing argument register budget for calls
    pub outs: u16,
    /// Decoded instructions with strictly increasing offsets
    pub instructions: Vec<Instruction>,
    /// Exception table
    pub tries: Vec<TryItem>,
}

impl CodeItem {
    /// Size of the body in code units.
    #[must_use]
    pub fn code_units(&self) -> u32 {
        self.instructions.last().map_or(0, Instruction::next_offset)
    }

    /// Index of the instruction starting at `offset`.
    #[must_use]
    pub fn index_of(&self, offset: u32) -> Option<usize> {
        self.instructions
            .binary_search_by_key(&offset, |insn| insn.offset)
            .ok()
    }

    /// The instruction starting at `offset`.
    #[must_use]
    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.index_of(offset).map(|index| &self.instructions[index])
    }

    /// The try item covering `offset`. Try items do not overlap.
    #[must_use]
    pub fn try_item_at(&self, offset: u32) -> Option<&TryItem> {
        self.tries.iter().find(|item| item.covers(offset))
    }

    /// Checks offsets, register counts and payloads.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for decreasing offsets, `ins`
    /// exceeding `registers`, a malformed switch or array payload, or
    /// overlapping or empty try items.
    pub fn validate(&self) -> Result<()> {
        if self.ins > self.registers {
            return Err(invalid_bytecode!(
                "{} incoming registers but only {} registers",
                self.ins,
                self.registers
            ));
        }
        for pair in self.instructions.windows(2) {
            if pair[0].next_offset() > pair[1].offset {
                return Err(invalid_bytecode!(
                    "instruction at {:#x} overlaps instruction at {:#x}",
                    pair[0].offset,
                    pair[1].offset
                ));
            }
        }
        for insn in &self.instructions {
            if insn.opcode.is_switch() {
                insn.switch_table()?.validate()?;
            }
            if let crate::bytecode::Operands::FillArray { data, .. } = &insn.operands {
                if !matches!(data.element_width, 1 | 2 | 4 | 8) {
                    return Err(invalid_bytecode!(
                        "array payload at {:#x} has element width {}",
                        insn.offset,
                        data.element_width
                    ));
                }
            }
        }
        let mut ranges: Vec<(u32, u32)> = self.tries.iter().map(|t| (t.start, t.end)).collect();
        ranges.sort_unstable();
        for (start, end) in &ranges {
            if start >= end {
                return Err(invalid_bytecode!("empty try range {start:#x}..{end:#x}"));
            }
        }
        for pair in ranges.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(invalid_bytecode!(
                    "try ranges {:#x}..{:#x} and {:#x}..{:#x} overlap",
                    pair[0].0,
                    pair[0].1,
                    pair[1].0,
                    pair[1].1
                ));
            }
        }
        Ok(())
    }

    /// First register holding an incoming argument.
    #[must_use]
    pub fn first_in_register(&self) -> Register {
        self.registers - self.ins
    }
}

/// Prototype of a method: return type and parameter descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Return type descriptor
    pub return_type: String,
    /// Parameter type descriptors, excluding `this`
    pub parameters: Vec<String>,
}

impl Signature {
    /// Creates a signature from descriptors.
    pub fn new(return_type: impl Into<String>, parameters: &[&str]) -> Self {
        Signature {
            return_type: return_type.into(),
            parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// Shorty form: the first character of the return and each parameter
    /// descriptor, with arrays spelled `L`.
    #[must_use]
    pub fn shorty(&self) -> String {
        std::iter::once(&self.return_type)
            .chain(&self.parameters)
            .map(|d| match d.chars().next() {
                Some('[') | None => 'L',
                Some(c) => c,
            })
            .collect()
    }

    /// Value type of the result.
    #[must_use]
    pub fn return_type(&self) -> DataType {
        DataType::from_descriptor(&self.return_type)
    }

    /// Value types of the parameters.
    pub fn parameter_types(&self) -> impl Iterator<Item = DataType> + '_ {
        self.parameters.iter().map(|p| DataType::from_descriptor(p))
    }

    /// Number of registers the parameters occupy, excluding `this`.
    #[must_use]
    pub fn parameter_registers(&self) -> usize {
        self.parameter_types()
            .map(|ty| if ty.is_64bit() { 2 } else { 1 })
            .sum()
    }
}

/// A field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldId {
    /// Declaring class type index
    pub class: u32,
    /// Field name
    pub name: String,
    /// Field type index
    pub type_index: u32,
}

/// A method reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodId {
    /// Declaring class type index
    pub class: u32,
    /// Method name
    pub name: String,
    /// Prototype
    pub signature: Signature,
}

impl MethodId {
    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }
}

/// Type, field, method and prototype tables shared by the methods of one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    /// Type descriptors by type index
    pub types: Vec<String>,
    /// Fields by field index
    pub fields: Vec<FieldId>,
    /// Methods by method index
    pub methods: Vec<MethodId>,
    /// Prototypes by prototype index
    pub protos: Vec<Signature>,
    /// Strings by string index
    pub strings: Vec<String>,
}

impl SymbolTable {
    /// Interns a type descriptor, returning its index.
    pub fn add_type(&mut self, descriptor: &str) -> u32 {
        if let Some(index) = self.types.iter().position(|t| t == descriptor) {
            return index as u32;
        }
        self.types.push(descriptor.to_string());
        (self.types.len() - 1) as u32
    }

    /// Adds a field, returning its index.
    pub fn add_field(&mut self, class: &str, name: &str, descriptor: &str) -> u32 {
        let class = self.add_type(class);
        let type_index = self.add_type(descriptor);
        self.fields.push(FieldId {
            class,
            name: name.to_string(),
            type_index,
        });
        (self.fields.len() - 1) as u32
    }

    /// Adds a method, returning its index.
    pub fn add_method(&mut self, class: &str, name: &str, signature: Signature) -> u32 {
        let class = self.add_type(class);
        self.methods.push(MethodId {
            class,
            name: name.to_string(),
            signature,
        });
        (self.methods.len() - 1) as u32
    }

    /// Adds a prototype, returning its index.
    pub fn add_proto(&mut self, signature: Signature) -> u32 {
        self.protos.push(signature);
        (self.protos.len() - 1) as u32
    }

    /// Adds a string, returning its index.
    pub fn add_string(&mut self, value: &str) -> u32 {
        self.strings.push(value.to_string());
        (self.strings.len() - 1) as u32
    }

    /// Descriptor of a type index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for an index outside the table.
    pub fn type_descriptor(&self, index: u32) -> Result<&str> {
        self.types
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| invalid_bytecode!("type index {} out of range", index))
    }

    /// Field reference of a field index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for an index outside the table.
    pub fn field(&self, index: u32) -> Result<&FieldId> {
        self.fields
            .get(index as usize)
            .ok_or_else(|| invalid_bytecode!("field index {} out of range", index))
    }

    /// Method reference of a method index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for an index outside the table.
    pub fn method(&self, index: u32) -> Result<&MethodId> {
        self.methods
            .get(index as usize)
            .ok_or_else(|| invalid_bytecode!("method index {} out of range", index))
    }

    /// Prototype of a prototype index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for an index outside the table.
    pub fn proto(&self, index: u32) -> Result<&Signature> {
        self.protos
            .get(index as usize)
            .ok_or_else(|| invalid_bytecode!("prototype index {} out of range", index))
    }

    /// Value type of a field.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] for an index outside the tables.
    pub fn field_type(&self, index: u32) -> Result<DataType> {
        let field = self.field(index)?;
        Ok(DataType::from_descriptor(self.type_descriptor(field.type_index)?))
    }
}

/// One method to build: its body, its identity and the tables it refers to.
#[derive(Debug, Clone, Copy)]
pub struct CompilationUnit<'a> {
    /// Index of the method in the symbol table
    pub method_index: u32,
    /// `true` if the method has no `this` parameter
    pub is_static: bool,
    /// The body, or `None` to build a minimal synthetic body
    pub code: Option<&'a CodeItem>,
    /// Shared symbol tables
    pub symbols: &'a SymbolTable,
    /// `true` if a constructor must publish its final fields with a fence before returning
    pub requires_constructor_barrier: bool,
}

impl<'a> CompilationUnit<'a> {
    /// Creates a unit for a method with a body.
    #[must_use]
    pub fn new(symbols: &'a SymbolTable, method_index: u32, code: &'a CodeItem) -> Self {
        CompilationUnit {
            method_index,
            is_static: false,
            code: Some(code),
            symbols,
            requires_constructor_barrier: false,
        }
    }

    /// Creates a unit whose body is synthesized.
    #[must_use]
    pub fn synthetic(symbols: &'a SymbolTable, method_index: u32) -> Self {
        CompilationUnit {
            method_index,
            is_static: true,
            code: None,
            symbols,
            requires_constructor_barrier: false,
        }
    }

    /// Marks the method as static.
    #[must_use]
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Marks the method as a constructor that needs a publication barrier.
    #[must_use]
    pub fn with_constructor_barrier(mut self, required: bool) -> Self {
        self.requires_constructor_barrier = required;
        self
    }

    /// The method's own reference.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidBytecode`] if the method index is out of range.
    pub fn method(&self) -> Result<&'a MethodId> {
        self.symbols.method(self.method_index)
    }
}
