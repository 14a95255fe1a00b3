//! Symbol resolution collaborator.
//!
//! The instruction builder asks a [`Resolver`] what the method, field and type
//! indices of a body refer to. Resolution is allowed to fail: an
//! [`Resolution::Unresolved`] answer is not an error but makes the builder emit
//! an unresolved operation whose checks happen at run time.
//!
//! The resolver is injected per build. Builds of different methods may share one
//! resolver across threads, hence the `Send + Sync` bound; [`CachedResolver`]
//! adds a concurrent memo in front of any implementation.
//!
//! # Key Types
//!
//! - [`Resolver`] - The collaborator interface
//! - [`Resolution`] - Resolved value or deferred resolution
//! - [`ResolvedType`] / [`ResolvedMethod`] / [`ResolvedField`] - Resolution results
//! - [`UnresolvedResolver`] / [`MapResolver`] / [`CachedResolver`] - Implementations

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;
use dashmap::DashMap;

use crate::bytecode::{SymbolTable, STRING_DESCRIPTOR};

/// How a method is invoked, as encoded in the calling instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum InvokeKind {
    /// Static call, no receiver
    Static,
    /// Non-virtual instance call (constructors, private methods)
    Direct,
    /// Virtual dispatch through the receiver's class
    Virtual,
    /// Call to the superclass implementation
    Super,
    /// Interface dispatch
    Interface,
    /// Signature-polymorphic call through a method handle
    Polymorphic,
}

/// Outcome of a resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The symbol resolved.
    Resolved(T),
    /// Resolution is deferred to run time. Never fails the build.
    Unresolved,
}

impl<T> Resolution<T> {
    /// The resolved value, if any.
    #[must_use]
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Unresolved => None,
        }
    }

    /// Converts into an `Option`.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            Resolution::Unresolved => None,
        }
    }

    /// Returns `true` for [`Resolution::Resolved`].
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Properties of a resolved class
    pub struct TypeFlags: u32 {
        /// Accessible from every class
        const PUBLIC = 0x0001;
        /// Cannot be subclassed
        const FINAL = 0x0010;
        /// An interface
        const INTERFACE = 0x0200;
        /// Cannot be instantiated
        const ABSTRACT = 0x0400;
        /// Instances need finalization
        const FINALIZABLE = 0x1000_0000;
        /// The string class
        const STRING = 0x2000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Properties of a resolved field
    pub struct FieldFlags: u32 {
        /// Static field
        const STATIC = 0x0008;
        /// Final field
        const FINAL = 0x0010;
        /// Volatile field
        const VOLATILE = 0x0040;
    }
}

/// A resolved class or array type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// Type index in the symbol table
    pub index: u32,
    /// Type descriptor
    pub descriptor: String,
    /// Class properties
    pub flags: TypeFlags,
}

impl ResolvedType {
    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::INTERFACE)
    }

    /// Returns `true` for abstract classes and interfaces.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.intersects(TypeFlags::ABSTRACT | TypeFlags::INTERFACE)
    }

    /// Returns `true` for final classes.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(TypeFlags::FINAL)
    }

    /// Returns `true` if instances need finalization.
    #[must_use]
    pub fn is_finalizable(&self) -> bool {
        self.flags.contains(TypeFlags::FINALIZABLE)
    }

    /// Returns `true` for the string class.
    #[must_use]
    pub fn is_string_class(&self) -> bool {
        self.flags.contains(TypeFlags::STRING)
    }

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.descriptor.starts_with('[')
    }

    /// Returns `true` if the class is accessible from everywhere.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(TypeFlags::PUBLIC) || self.is_array()
    }
}

/// A resolved method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    /// Method index in the symbol table
    pub index: u32,
    /// Declaring class
    pub declaring_class: ResolvedType,
    /// `true` for instance constructors
    pub is_constructor: bool,
    /// Vtable or interface table slot used by virtual and interface dispatch
    pub dispatch_index: u32,
}

impl ResolvedMethod {
    /// Returns `true` for constructors of the string class, which are built as factory calls.
    #[must_use]
    pub fn is_string_init(&self) -> bool {
        self.is_constructor && self.declaring_class.is_string_class()
    }
}

/// A resolved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    /// Field index in the symbol table
    pub index: u32,
    /// Declaring class
    pub declaring_class: ResolvedType,
    /// Field properties
    pub flags: FieldFlags,
}

impl ResolvedField {
    /// Returns `true` for volatile fields.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.flags.contains(FieldFlags::VOLATILE)
    }

    /// Returns `true` for final fields.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(FieldFlags::FINAL)
    }
}

/// Answers symbol queries for the instruction builder.
///
/// Implementations must be safe for concurrent reads: independent methods may
/// be built in parallel against one resolver.
pub trait Resolver: Send + Sync {
    /// Resolves a method index for the given kind of call.
    fn resolve_method(&self, index: u32, kind: InvokeKind) -> Resolution<ResolvedMethod>;

    /// Resolves a field index for a static or instance access.
    fn resolve_field(&self, index: u32, is_static: bool) -> Resolution<ResolvedField>;

    /// Resolves a type index.
    fn resolve_type(&self, index: u32) -> Resolution<ResolvedType>;

    /// Returns `true` if the class is known to be initialized, so no
    /// initialization check is needed before static accesses.
    fn is_initialized(&self, ty: &ResolvedType) -> bool;
}

/// A resolver that defers everything to run time.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnresolvedResolver;

impl Resolver for UnresolvedResolver {
    fn resolve_method(&self, _index: u32, _kind: InvokeKind) -> Resolution<ResolvedMethod> {
        Resolution::Unresolved
    }

    fn resolve_field(&self, _index: u32, _is_static: bool) -> Resolution<ResolvedField> {
        Resolution::Unresolved
    }

    fn resolve_type(&self, _index: u32) -> Resolution<ResolvedType> {
        Resolution::Unresolved
    }

    fn is_initialized(&self, _ty: &ResolvedType) -> bool {
        false
    }
}

/// A resolver backed by explicit tables.
///
/// [`MapResolver::from_symbols`] resolves every symbol of a table: classes are
/// public and initialized, the string class is flagged as such. Individual
/// entries can then be removed or adjusted to model unresolved symbols and
/// uninitialized classes.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    types: HashMap<u32, ResolvedType>,
    methods: HashMap<u32, ResolvedMethod>,
    fields: HashMap<u32, (ResolvedField, bool)>,
    uninitialized: HashSet<u32>,
}

impl MapResolver {
    /// Creates an empty resolver; every query is unresolved.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver that resolves every symbol of `symbols`.
    #[must_use]
    pub fn from_symbols(symbols: &SymbolTable) -> Self {
        let mut resolver = MapResolver::new();
        for (index, descriptor) in symbols.types.iter().enumerate() {
            let flags = if descriptor == STRING_DESCRIPTOR {
                TypeFlags::PUBLIC | TypeFlags::FINAL | TypeFlags::STRING
            } else {
                TypeFlags::PUBLIC
            };
            resolver.types.insert(
                index as u32,
                ResolvedType {
                    index: index as u32,
                    descriptor: descriptor.clone(),
                    flags,
                },
            );
        }
        for (index, method) in symbols.methods.iter().enumerate() {
            if let Some(class) = resolver.types.get(&method.class).cloned() {
                resolver.methods.insert(
                    index as u32,
                    ResolvedMethod {
                        index: index as u32,
                        declaring_class: class,
                        is_constructor: method.is_constructor(),
                        dispatch_index: index as u32,
                    },
                );
            }
        }
        for (index, field) in symbols.fields.iter().enumerate() {
            if let Some(class) = resolver.types.get(&field.class).cloned() {
                let resolved = ResolvedField {
                    index: index as u32,
                    declaring_class: class,
                    flags: FieldFlags::empty(),
                };
                resolver.fields.insert(index as u32, (resolved, false));
            }
        }
        resolver
    }

    /// Replaces the flags of a type, also updating methods and fields it declares.
    pub fn set_type_flags(&mut self, index: u32, flags: TypeFlags) -> &mut Self {
        if let Some(ty) = self.types.get_mut(&index) {
            ty.flags = flags;
        }
        for method in self.methods.values_mut() {
            if method.declaring_class.index == index {
                method.declaring_class.flags = flags;
            }
        }
        for (field, _) in self.fields.values_mut() {
            if field.declaring_class.index == index {
                field.declaring_class.flags = flags;
            }
        }
        self
    }

    /// Marks a field as static (or instance) with the given extra flags.
    pub fn set_field(&mut self, index: u32, is_static: bool, flags: FieldFlags) -> &mut Self {
        if let Some((field, stat)) = self.fields.get_mut(&index) {
            field.flags = if is_static {
                flags | FieldFlags::STATIC
            } else {
                flags
            };
            *stat = is_static;
        }
        self
    }

    /// Reports a class as not yet initialized.
    pub fn set_uninitialized(&mut self, type_index: u32) -> &mut Self {
        self.uninitialized.insert(type_index);
        self
    }

    /// Makes a type unresolvable.
    pub fn unresolve_type(&mut self, index: u32) -> &mut Self {
        self.types.remove(&index);
        self
    }

    /// Makes a method unresolvable.
    pub fn unresolve_method(&mut self, index: u32) -> &mut Self {
        self.methods.remove(&index);
        self
    }

    /// Makes a field unresolvable.
    pub fn unresolve_field(&mut self, index: u32) -> &mut Self {
        self.fields.remove(&index);
        self
    }
}

impl Resolver for MapResolver {
    fn resolve_method(&self, index: u32, kind: InvokeKind) -> Resolution<ResolvedMethod> {
        match self.methods.get(&index) {
            // Interface dispatch needs an interface, class dispatch a class.
            Some(method)
                if (kind == InvokeKind::Interface) == method.declaring_class.is_interface()
                    || kind == InvokeKind::Static
                    || kind == InvokeKind::Polymorphic =>
            {
                Resolution::Resolved(method.clone())
            }
            _ => Resolution::Unresolved,
        }
    }

    fn resolve_field(&self, index: u32, is_static: bool) -> Resolution<ResolvedField> {
        match self.fields.get(&index) {
            Some((field, stat)) if *stat == is_static => Resolution::Resolved(field.clone()),
            _ => Resolution::Unresolved,
        }
    }

    fn resolve_type(&self, index: u32) -> Resolution<ResolvedType> {
        self.types
            .get(&index)
            .cloned()
            .map_or(Resolution::Unresolved, Resolution::Resolved)
    }

    fn is_initialized(&self, ty: &ResolvedType) -> bool {
        !self.uninitialized.contains(&ty.index)
    }
}

/// Memoizes the answers of another resolver.
///
/// The caches are concurrent maps, so one `CachedResolver` can serve parallel
/// builds. Initialization state is never cached, since classes become
/// initialized over time.
#[derive(Debug, Default)]
pub struct CachedResolver<R> {
    inner: R,
    methods: DashMap<(u32, InvokeKind), Resolution<ResolvedMethod>>,
    fields: DashMap<(u32, bool), Resolution<ResolvedField>>,
    types: DashMap<u32, Resolution<ResolvedType>>,
}

impl<R: Resolver> CachedResolver<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        CachedResolver {
            inner,
            methods: DashMap::new(),
            fields: DashMap::new(),
            types: DashMap::new(),
        }
    }

    /// The wrapped resolver.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of memoized answers.
    pub fn cached(&self) -> usize {
        self.methods.len() + self.fields.len() + self.types.len()
    }

    /// Drops every memoized answer.
    pub fn clear(&self) {
        self.methods.clear();
        self.fields.clear();
        self.types.clear();
    }
}

impl<R: Resolver> Resolver for CachedResolver<R> {
    fn resolve_method(&self, index: u32, kind: InvokeKind) -> Resolution<ResolvedMethod> {
        self.methods
            .entry((index, kind))
            .or_insert_with(|| self.inner.resolve_method(index, kind))
            .clone()
    }

    fn resolve_field(&self, index: u32, is_static: bool) -> Resolution<ResolvedField> {
        self.fields
            .entry((index, is_static))
            .or_insert_with(|| self.inner.resolve_field(index, is_static))
            .clone()
    }

    fn resolve_type(&self, index: u32) -> Resolution<ResolvedType> {
        self.types
            .entry(index)
            .or_insert_with(|| self.inner.resolve_type(index))
            .clone()
    }

    fn is_initialized(&self, ty: &ResolvedType) -> bool {
        self.inner.is_initialized(ty)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::bytecode::Signature;

    struct Counting(AtomicUsize);

    impl Resolver for Counting {
        fn resolve_method(&self, _index: u32, _kind: InvokeKind) -> Resolution<ResolvedMethod> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Resolution::Unresolved
        }

        fn resolve_field(&self, _index: u32, _is_static: bool) -> Resolution<ResolvedField> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Resolution::Unresolved
        }

        fn resolve_type(&self, index: u32) -> Resolution<ResolvedType> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Resolution::Resolved(ResolvedType {
                index,
                descriptor: "LFoo;".to_string(),
                flags: TypeFlags::PUBLIC,
            })
        }

        fn is_initialized(&self, _ty: &ResolvedType) -> bool {
            true
        }
    }

    fn symbols() -> SymbolTable {
        let mut symbols = SymbolTable::default();
        symbols.add_method("LFoo;", "bar", Signature::new("V", &[]));
        symbols.add_method(STRING_DESCRIPTOR, "<init>", Signature::new("V", &["[C"]));
        symbols.add_field("LFoo;", "x", "I");
        symbols
    }

    #[test]
    fn test_map_resolver_from_symbols() {
        let symbols = symbols();
        let resolver = MapResolver::from_symbols(&symbols);

        let method = resolver.resolve_method(0, InvokeKind::Virtual);
        assert!(method.is_resolved());
        assert!(!method.resolved().unwrap().is_string_init());

        let init = resolver.resolve_method(1, InvokeKind::Direct).into_option().unwrap();
        assert!(init.is_string_init());

        assert!(resolver.resolve_field(0, false).is_resolved());
        assert!(!resolver.resolve_field(0, true).is_resolved());
    }

    #[test]
    fn test_map_resolver_interface_mismatch() {
        let symbols = symbols();
        let resolver = MapResolver::from_symbols(&symbols);
        assert!(!resolver.resolve_method(0, InvokeKind::Interface).is_resolved());
    }

    #[test]
    fn test_map_resolver_adjustments() {
        let symbols = symbols();
        let mut resolver = MapResolver::from_symbols(&symbols);
        resolver.set_uninitialized(0).unresolve_method(0);

        let foo = resolver.resolve_type(0).into_option().unwrap();
        assert!(!resolver.is_initialized(&foo));
        assert!(!resolver.resolve_method(0, InvokeKind::Static).is_resolved());
    }

    #[test]
    fn test_cached_resolver_memoizes() {
        let cached = CachedResolver::new(Counting(AtomicUsize::new(0)));
        for _ in 0..3 {
            assert!(cached.resolve_type(7).is_resolved());
            assert!(!cached.resolve_method(1, InvokeKind::Static).is_resolved());
        }
        assert_eq!(cached.inner().0.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cached(), 2);
        cached.clear();
        assert_eq!(cached.cached(), 0);
    }

    #[test]
    fn test_unresolved_resolver() {
        let resolver = UnresolvedResolver;
        assert!(!resolver.resolve_type(0).is_resolved());
        assert!(!resolver.resolve_field(0, true).is_resolved());
    }
}
