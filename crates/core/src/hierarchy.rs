//! Class hierarchy service.
//!
//! The hierarchy answers the two questions the live query engine needs from the
//! document model: whether one class derives from another, and whether an
//! attribute is defined on the base class or contributed by a mixin.

use crate::error::{Error, Result};
use crate::ids::ClassRef;
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// Whether a class definition is a regular class or a mixin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Mixin,
}

/// A class definition in the hierarchy.
#[derive(Clone, Debug)]
pub struct ClassDef {
    id: ClassRef,
    extends: Option<ClassRef>,
    kind: ClassKind,
    attributes: BTreeSet<String>,
}

impl ClassDef {
    /// Returns the class reference.
    #[inline]
    pub fn id(&self) -> &ClassRef {
        &self.id
    }

    /// Returns the parent class, if any.
    #[inline]
    pub fn extends(&self) -> Option<&ClassRef> {
        self.extends.as_ref()
    }

    /// Returns the class kind.
    #[inline]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Returns true if the attribute is declared directly on this class.
    pub fn declares(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }
}

/// How an attribute key resolves against a class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeKey {
    /// Attribute stored on the base document.
    Base(String),
    /// Attribute stored in the overlay of the given mixin.
    Mixin { mixin: ClassRef, attribute: String },
}

/// The class/mixin hierarchy of the document model.
#[derive(Clone, Debug, Default)]
pub struct Hierarchy {
    classes: HashMap<ClassRef, ClassDef>,
}

impl Hierarchy {
    /// Starts building a hierarchy.
    pub fn builder() -> HierarchyBuilder {
        HierarchyBuilder::default()
    }

    /// Returns true if the class is known.
    pub fn contains(&self, class: &ClassRef) -> bool {
        self.classes.contains_key(class)
    }

    /// Gets a class definition.
    pub fn get(&self, class: &ClassRef) -> Option<&ClassDef> {
        self.classes.get(class)
    }

    /// Fails with `ClassNotFound` for unknown classes.
    pub fn require(&self, class: &ClassRef) -> Result<&ClassDef> {
        self.get(class).ok_or_else(|| Error::class_not_found(class))
    }

    /// Returns true if the class is a mixin.
    pub fn is_mixin(&self, class: &ClassRef) -> bool {
        self.get(class)
            .map(|c| c.kind == ClassKind::Mixin)
            .unwrap_or(false)
    }

    /// Returns the class followed by all of its ancestors, nearest first.
    pub fn ancestors(&self, class: &ClassRef) -> Vec<&ClassRef> {
        let mut chain = Vec::new();
        let mut current = self.get(class);
        while let Some(def) = current {
            chain.push(&def.id);
            current = def.extends.as_ref().and_then(|p| self.get(p));
        }
        chain
    }

    /// Returns true if `class` is `ancestor` or derives from it.
    pub fn is_derived(&self, class: &ClassRef, ancestor: &ClassRef) -> bool {
        if class == ancestor {
            return true;
        }
        self.ancestors(class).into_iter().any(|c| c == ancestor)
    }

    /// Returns the nearest non-mixin ancestor of a class (the class itself for
    /// regular classes).
    pub fn base_class<'a>(&'a self, class: &'a ClassRef) -> &'a ClassRef {
        self.ancestors(class)
            .into_iter()
            .find(|c| !self.is_mixin(c))
            .unwrap_or(class)
    }

    /// Returns the class in `class`'s ancestry that declares `attribute`.
    pub fn find_attribute_owner(&self, class: &ClassRef, attribute: &str) -> Option<&ClassRef> {
        self.ancestors(class)
            .into_iter()
            .find(|c| self.get(c).map(|d| d.declares(attribute)).unwrap_or(false))
    }

    /// Resolves whether `key`, read through `class`, is a base attribute or a
    /// mixin overlay attribute.
    ///
    /// A key of the form `<mixin>.<attribute>` is always a mixin key when the
    /// prefix names a mixin; otherwise the declaring class decides.
    pub fn check_mixin_key(&self, key: &str, class: &ClassRef) -> AttributeKey {
        if let Some((prefix, rest)) = split_mixin_key(key) {
            let prefix = ClassRef::from(prefix);
            if self.is_mixin(&prefix) {
                return AttributeKey::Mixin {
                    mixin: prefix,
                    attribute: rest.to_string(),
                };
            }
        }
        match self.find_attribute_owner(class, key) {
            Some(owner) if self.is_mixin(owner) => AttributeKey::Mixin {
                mixin: owner.clone(),
                attribute: key.to_string(),
            },
            _ => AttributeKey::Base(key.to_string()),
        }
    }

    /// Returns true if documents of `doc_class` can appear in a query over
    /// `query_class`: either by derivation, or because `query_class` is a
    /// mixin of a class `doc_class` derives from.
    pub fn is_compatible(&self, doc_class: &ClassRef, query_class: &ClassRef) -> bool {
        if self.is_derived(doc_class, query_class) {
            return true;
        }
        self.is_mixin(query_class) && self.is_derived(doc_class, self.base_class(query_class))
    }

    /// Returns the number of known classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if the hierarchy is empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Splits a mixin-qualified key at its last `.`, since class references may
/// themselves contain dots.
fn split_mixin_key(key: &str) -> Option<(&str, &str)> {
    let idx = key.rfind('.')?;
    let (prefix, rest) = (&key[..idx], &key[idx + 1..]);
    if prefix.is_empty() || rest.is_empty() {
        None
    } else {
        Some((prefix, rest))
    }
}

/// Builder for creating hierarchies.
#[derive(Default)]
pub struct HierarchyBuilder {
    classes: Vec<ClassDef>,
}

impl HierarchyBuilder {
    /// Adds a regular class.
    pub fn class<I, S>(mut self, id: impl Into<ClassRef>, extends: Option<&str>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.push(ClassDef {
            id: id.into(),
            extends: extends.map(ClassRef::from),
            kind: ClassKind::Class,
            attributes: attributes.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Adds a mixin extending `extends`.
    pub fn mixin<I, S>(mut self, id: impl Into<ClassRef>, extends: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.push(ClassDef {
            id: id.into(),
            extends: Some(ClassRef::from(extends)),
            kind: ClassKind::Mixin,
            attributes: attributes.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validates parents and cycles, and builds the hierarchy.
    pub fn build(self) -> Result<Hierarchy> {
        let mut classes = HashMap::with_capacity(self.classes.len());
        for def in self.classes {
            if classes.contains_key(&def.id) {
                return Err(Error::invalid_operation(format!(
                    "duplicate class definition: {}",
                    def.id
                )));
            }
            classes.insert(def.id.clone(), def);
        }

        for def in classes.values() {
            let mut steps = 0;
            let mut parent = def.extends.as_ref();
            while let Some(p) = parent {
                let parent_def = classes.get(p).ok_or_else(|| Error::class_not_found(p))?;
                steps += 1;
                if steps > classes.len() {
                    return Err(Error::invalid_operation(format!(
                        "cyclic class hierarchy at {}",
                        def.id
                    )));
                }
                parent = parent_def.extends.as_ref();
            }
        }

        Ok(Hierarchy { classes })
    }
}
