//! Lazily computed, invalidatable caches with upward invalidation
//!
//! Every model that has a serialized form owns a [`CacheCell`]. A cell may be
//! linked to the cell of the model that contains it (its *owner*); clearing a
//! cell clears every cell above it, so a change anywhere in a resource reaches
//! the package that holds it. Links only point upward and are weak, so a
//! parent owning its children never forms an ownership cycle.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Shared, immutable serialized bytes.
pub type Bytes = Rc<[u8]>;

/// A node in the invalidation forest.
trait Invalidate {
    fn invalidate(&self);
}

struct Node<T> {
    value: RefCell<Option<T>>,
    owner: RefCell<Option<Weak<dyn Invalidate>>>,
}

impl<T> Invalidate for Node<T> {
    fn invalidate(&self) {
        // Drop the value before walking up so no borrow is held across the call.
        let stale = self.value.borrow_mut().take();
        drop(stale);

        let owner = self.owner.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(owner) = owner {
            owner.invalidate();
        }
    }
}

/// Non-owning handle to a cell, used as the owner of child cells.
#[derive(Clone)]
pub struct OwnerLink(Weak<dyn Invalidate>);

impl OwnerLink {
    /// Returns true if both links refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &OwnerLink) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }

    /// Returns true if the cell this link refers to is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for OwnerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerLink")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// A lazily computed value that can be invalidated, with an optional owner
/// that is invalidated along with it.
///
/// Invariant: when a value is present it reflects the current state of the
/// model that owns this cell. Anything that could change that state must call
/// [`CacheCell::uncache`].
///
/// Cloning a model never clones its cell; a clone starts uncached and unowned.
///
/// Outside this crate a cell can only be filled by computing its value, never
/// by storing arbitrary bytes:
///
/// ```compile_fail
/// use simpak::base::CacheCell;
///
/// let cell: CacheCell = CacheCell::new();
/// cell.set(std::rc::Rc::from(&b"stale"[..]));
/// ```
pub struct CacheCell<T = Bytes> {
    node: Rc<Node<T>>,
}

impl<T: 'static> CacheCell<T> {
    /// Creates an empty cell with no owner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            node: Rc::new(Node {
                value: RefCell::new(None),
                owner: RefCell::new(None),
            }),
        }
    }

    /// Creates a cell that already holds `value`, e.g. the bytes a model was
    /// read from.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        let cell = Self::new();
        *cell.node.value.borrow_mut() = Some(value);
        cell
    }

    /// Returns the cached value, if any.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.node.value.borrow().clone()
    }

    /// Returns the cached value, computing and storing it first if needed.
    ///
    /// `init` is never called while the cell is borrowed, so it may read other
    /// cells freely.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        T: Clone,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let value = init()?;
        *self.node.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    /// Stores `value` without notifying the owner.
    ///
    /// Only for seeding a cache with bytes known to match the model.
    pub(crate) fn set(&self, value: T) {
        *self.node.value.borrow_mut() = Some(value);
    }

    /// Whether a value is currently cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.node.value.borrow().is_some()
    }

    /// Clears the cached value and every cached value above it.
    ///
    /// Idempotent: calling it on an empty cell still notifies the owner, which
    /// is itself a no-op if the owner is already empty.
    pub fn uncache(&self) {
        self.node.invalidate();
    }

    /// Returns a link that child cells can use to name this cell as their owner.
    #[must_use]
    pub fn owner_link(&self) -> OwnerLink {
        let weak: Weak<dyn Invalidate> = Rc::downgrade(&self.node) as Weak<dyn Invalidate>;
        OwnerLink(weak)
    }

    /// Sets the owner that is invalidated whenever this cell is.
    pub fn set_owner(&self, owner: &OwnerLink) {
        *self.node.owner.borrow_mut() = Some(owner.0.clone());
    }

    /// Removes the owner link, if any.
    pub fn clear_owner(&self) {
        self.node.owner.borrow_mut().take();
    }

    /// Whether this cell currently has a live owner.
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.node
            .owner
            .borrow()
            .as_ref()
            .is_some_and(|owner| owner.strong_count() > 0)
    }

    /// Whether `owner` is this cell's owner.
    #[must_use]
    pub fn is_owned_by(&self, owner: &OwnerLink) -> bool {
        self.node
            .owner
            .borrow()
            .as_ref()
            .is_some_and(|current| Weak::ptr_eq(current, &owner.0))
    }
}

impl<T: 'static> Default for CacheCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for CacheCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCell")
            .field("cached", &self.is_cached())
            .field("owned", &self.has_owner())
            .finish()
    }
}

/// Type-erased view of a [`CacheCell`], so collections can link entries
/// without knowing what the entries cache.
pub trait Cacheable {
    /// Whether a value is currently cached.
    fn is_cached(&self) -> bool;
    /// Clears the cached value and notifies the owner.
    fn uncache(&self);
    /// Sets the owner.
    fn set_owner(&self, owner: &OwnerLink);
    /// Removes the owner.
    fn clear_owner(&self);
    /// Whether `owner` is the current owner.
    fn is_owned_by(&self, owner: &OwnerLink) -> bool;
}

impl<T: 'static> Cacheable for CacheCell<T> {
    fn is_cached(&self) -> bool {
        CacheCell::is_cached(self)
    }

    fn uncache(&self) {
        CacheCell::uncache(self);
    }

    fn set_owner(&self, owner: &OwnerLink) {
        CacheCell::set_owner(self, owner);
    }

    fn clear_owner(&self) {
        CacheCell::clear_owner(self);
    }

    fn is_owned_by(&self, owner: &OwnerLink) -> bool {
        CacheCell::is_owned_by(self, owner)
    }
}
