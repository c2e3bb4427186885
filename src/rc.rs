//! Reference-counted mutable handles.
//!
//! [`MutRc`] is the single-threaded handle (`Rc<RefCell<T>>`) and [`MutArc`]
//! the thread-safe one (`Arc<Mutex<T>>`). Both are cheap to clone, compare by
//! identity through [`PtrEq`], and forward the [`Observer`] protocol to the
//! value they guard, which is how observer references are shared between a
//! subject and the code that subscribed them.

use std::{
  cell::{Ref, RefCell, RefMut},
  ops::{Deref, DerefMut},
  rc::{Rc, Weak as RcWeak},
  sync::{Arc, Mutex, MutexGuard, PoisonError, Weak as ArcWeak},
};

use crate::observer::Observer;

/// Shared read access to the value behind a handle.
pub trait RcDeref {
  type Target: ?Sized;
  type Ref<'a>: Deref<Target = Self::Target>
  where
    Self: 'a;

  fn rc_deref(&self) -> Self::Ref<'_>;
}

/// Exclusive access to the value behind a handle.
///
/// For [`MutRc`] this is a `RefMut`, for [`MutArc`] a mutex guard. Holding
/// the returned guard while calling into user code is a bug: the user code
/// may re-enter the same handle.
pub trait RcDerefMut: RcDeref {
  type RefMut<'a>: DerefMut<Target = Self::Target>
  where
    Self: 'a;

  fn rc_deref_mut(&self) -> Self::RefMut<'_>;
}

/// Identity comparison: two handles are equal when they point to the same
/// allocation.
pub trait PtrEq {
  fn ptr_eq(&self, other: &Self) -> bool;
}

pub struct MutRc<T: ?Sized>(Rc<RefCell<T>>);

pub struct MutArc<T: ?Sized>(Arc<Mutex<T>>);

/// Non-owning counterpart of [`MutRc`].
pub struct WeakRc<T: ?Sized>(RcWeak<RefCell<T>>);

/// Non-owning counterpart of [`MutArc`].
pub struct WeakArc<T: ?Sized>(ArcWeak<Mutex<T>>);

impl<T> MutRc<T> {
  pub fn own(t: T) -> Self { Self(Rc::new(RefCell::new(t))) }
}

impl<T> MutArc<T> {
  pub fn own(t: T) -> Self { Self(Arc::new(Mutex::new(t))) }
}

impl<T: ?Sized> MutRc<T> {
  pub(crate) fn from_rc(rc: Rc<RefCell<T>>) -> Self { Self(rc) }

  pub fn downgrade(&self) -> WeakRc<T> { WeakRc(Rc::downgrade(&self.0)) }
}

impl<T: ?Sized> MutArc<T> {
  pub(crate) fn from_arc(arc: Arc<Mutex<T>>) -> Self { Self(arc) }

  pub fn downgrade(&self) -> WeakArc<T> { WeakArc(Arc::downgrade(&self.0)) }
}

impl<T: ?Sized> WeakRc<T> {
  pub fn upgrade(&self) -> Option<MutRc<T>> { self.0.upgrade().map(MutRc) }
}

impl<T: ?Sized> WeakArc<T> {
  pub fn upgrade(&self) -> Option<MutArc<T>> { self.0.upgrade().map(MutArc) }
}

impl<T> From<T> for MutRc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T> From<T> for MutArc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T: ?Sized> RcDeref for MutRc<T> {
  type Target = T;
  type Ref<'a>
    = Ref<'a, T>
  where
    Self: 'a;

  #[inline]
  fn rc_deref(&self) -> Self::Ref<'_> { self.0.borrow() }
}

impl<T: ?Sized> RcDerefMut for MutRc<T> {
  type RefMut<'a>
    = RefMut<'a, T>
  where
    Self: 'a;

  #[inline]
  fn rc_deref_mut(&self) -> Self::RefMut<'_> { self.0.borrow_mut() }
}

// Observers never run under the lock, so a poisoned mutex still guards
// consistent state.
impl<T: ?Sized> RcDeref for MutArc<T> {
  type Target = T;
  type Ref<'a>
    = MutexGuard<'a, T>
  where
    Self: 'a;

  #[inline]
  fn rc_deref(&self) -> Self::Ref<'_> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }
}

impl<T: ?Sized> RcDerefMut for MutArc<T> {
  type RefMut<'a>
    = MutexGuard<'a, T>
  where
    Self: 'a;

  #[inline]
  fn rc_deref_mut(&self) -> Self::RefMut<'_> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<T: ?Sized> PtrEq for MutRc<T> {
  #[inline]
  fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl<T: ?Sized> PtrEq for MutArc<T> {
  #[inline]
  fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl<T: ?Sized> Clone for MutRc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: ?Sized> Clone for MutArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: ?Sized> Clone for WeakRc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T: ?Sized> Clone for WeakArc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

macro_rules! observer_impl {
  ($rc: ident) => {
    impl<Item, Err, T> Observer<Item, Err> for $rc<T>
    where
      T: Observer<Item, Err> + ?Sized,
    {
      #[inline]
      fn next(&mut self, value: Item) { self.rc_deref_mut().next(value) }

      #[inline]
      fn error(&mut self, err: Err) { self.rc_deref_mut().error(err) }

      #[inline]
      fn complete(&mut self) { self.rc_deref_mut().complete() }
    }
  };
}

observer_impl!(MutArc);
observer_impl!(MutRc);
