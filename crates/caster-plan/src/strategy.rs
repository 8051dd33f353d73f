//! Conversion strategy selection
//!
//! Compares the types at both ends of an assignment and picks the technique
//! the emitter renders. Containers recurse one nesting level at a time.

use crate::model::{Conversion, ConversionStrategy, TypePairKey, TypeScope};
use crate::resolve::is_struct;
use caster_graph::{Kind, TypeExpr};
use caster_mapping::Hint;

/// Stateless selector bound to a type scope
#[derive(Debug, Clone, Copy)]
pub struct StrategySelector<'a> {
    scope: TypeScope<'a>,
}

impl<'a> StrategySelector<'a> {
    /// Create a selector
    #[must_use]
    pub fn new(scope: TypeScope<'a>) -> Self {
        Self { scope }
    }

    /// Choose the conversion from `source` to `target`.
    ///
    /// Never fails: an inexpressible conversion comes back with
    /// `fallback` set.
    #[must_use]
    pub fn select(&self, source: &TypeExpr, target: &TypeExpr, hint: Hint) -> Conversion {
        if hint == Hint::Final {
            return self.select_final(source, target);
        }

        let src_kind = self.scope.kind_of(self.scope.underlying(source));
        let tgt_kind = self.scope.kind_of(self.scope.underlying(target));

        match (src_kind, tgt_kind) {
            (Kind::Slice | Kind::Array, Kind::Slice | Kind::Array) => {
                self.select_sequence(source, target, tgt_kind, hint)
            }
            (Kind::Map, Kind::Map) => self.select_map(source, target, hint),
            _ if source == target => {
                if hint == Hint::Dive && is_struct(self.scope, source) {
                    self.nested(source, target)
                } else {
                    Conversion::leaf(ConversionStrategy::DirectAssign, source.clone(), target.clone())
                }
            }
            (Kind::Pointer, Kind::Pointer) => {
                let inner = self.select(
                    self.pointee(source),
                    self.pointee(target),
                    hint,
                );
                self.wrap(ConversionStrategy::PointerNestedCast, source, target, inner)
            }
            (Kind::Pointer, _) => {
                let inner = self.select(self.pointee(source), target, hint);
                self.wrap(ConversionStrategy::PointerDeref, source, target, inner)
            }
            (_, Kind::Pointer) => {
                let inner = self.select(source, self.pointee(target), hint);
                self.wrap(ConversionStrategy::PointerWrap, source, target, inner)
            }
            (Kind::Struct, Kind::Struct) => self.nested(source, target),
            (Kind::Basic, Kind::Basic) => {
                Conversion::leaf(ConversionStrategy::Convert, source.clone(), target.clone())
            }
            _ if self.scope.underlying(source) == self.scope.underlying(target) => {
                Conversion::leaf(ConversionStrategy::Convert, source.clone(), target.clone())
            }
            _ => Conversion::fallback(source.clone(), target.clone()),
        }
    }

    /// `final`: no introspection, only assignment or a Go conversion
    fn select_final(&self, source: &TypeExpr, target: &TypeExpr) -> Conversion {
        if source == target {
            Conversion::leaf(ConversionStrategy::DirectAssign, source.clone(), target.clone())
        } else {
            Conversion::leaf(ConversionStrategy::Convert, source.clone(), target.clone())
        }
    }

    fn select_sequence(
        &self,
        source: &TypeExpr,
        target: &TypeExpr,
        target_kind: Kind,
        hint: Hint,
    ) -> Conversion {
        // arrays are values; identical arrays copy by assignment
        if source == target && target_kind == Kind::Array && hint != Hint::Dive {
            return Conversion::leaf(ConversionStrategy::DirectAssign, source.clone(), target.clone());
        }
        let (Some(src_elem), Some(tgt_elem)) = (
            self.scope.underlying(source).elem(),
            self.scope.underlying(target).elem(),
        ) else {
            return Conversion::fallback(source.clone(), target.clone());
        };
        let elem = self.select(src_elem, tgt_elem, hint);
        self.wrap(ConversionStrategy::SliceMap, source, target, elem)
    }

    fn select_map(&self, source: &TypeExpr, target: &TypeExpr, hint: Hint) -> Conversion {
        let (
            TypeExpr::Map {
                key: src_key,
                elem: src_elem,
            },
            TypeExpr::Map {
                key: tgt_key,
                elem: tgt_elem,
            },
        ) = (self.scope.underlying(source), self.scope.underlying(target))
        else {
            return Conversion::fallback(source.clone(), target.clone());
        };

        let key = self.select(src_key, tgt_key, Hint::None);
        let elem = self.select(src_elem, tgt_elem, hint);
        Conversion {
            key: Some(Box::new(key)),
            ..Conversion::wrapping(ConversionStrategy::Map, source.clone(), target.clone(), elem)
        }
    }

    fn nested(&self, source: &TypeExpr, target: &TypeExpr) -> Conversion {
        let (Some(src), Some(tgt)) = (
            self.scope.struct_of(source),
            self.scope.struct_of(target),
        ) else {
            return Conversion::fallback(source.clone(), target.clone());
        };
        Conversion {
            nested: Some(TypePairKey::new(src.id.clone(), tgt.id.clone())),
            ..Conversion::leaf(ConversionStrategy::NestedCast, source.clone(), target.clone())
        }
    }

    fn pointee<'t>(&self, ty: &'t TypeExpr) -> &'t TypeExpr
    where
        'a: 't,
    {
        self.scope.underlying(ty).elem().unwrap_or(ty)
    }

    fn wrap(
        &self,
        strategy: ConversionStrategy,
        source: &TypeExpr,
        target: &TypeExpr,
        inner: Conversion,
    ) -> Conversion {
        if inner.fallback {
            return Conversion::fallback(source.clone(), target.clone());
        }
        Conversion::wrapping(strategy, source.clone(), target.clone(), inner)
    }
}
