//! Type-erased value container with small-buffer storage.
//!
//! [`Value`] owns exactly one instance of any [`Typed`] type that is
//! `Clone + Send + Sync`, or nothing at all (the *void* value). It is the
//! currency of the invocation pipeline: arguments go in as `Value`s, results
//! come back as `Value`s.
//!
//! # Storage
//!
//! Payloads that fit in [`INLINE_CAPACITY`] bytes with an alignment of at
//! most 16 live inside the `Value` itself. Larger payloads are placed in a
//! separately allocated block. Zero-sized payloads with a larger alignment
//! take the heap path without allocating. Either way the payload is reached through a
//! per-type vtable that knows how to clone, drop and downcast it.
//!
//! # Example
//!
//! ```
//! use refract_core::{Value, primitives};
//!
//! let v = Value::new(42i32);
//! assert_eq!(v.type_hash(), primitives::I32);
//! assert_eq!(v.get::<i32>(), Some(&42));
//! assert!(v.is_inline());
//!
//! let copy = v.clone();
//! assert_eq!(copy.into_inner::<i32>().ok(), Some(42));
//! ```

use std::alloc::{Layout, alloc, dealloc};
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr::{self, NonNull};

use crate::{TypeHash, Typed, primitives};

/// Bytes available for inline payloads.
pub const INLINE_CAPACITY: usize = 3 * size_of::<usize>();

/// Largest alignment an inline payload may require.
pub const INLINE_ALIGN: usize = 16;

#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct InlineBuf([MaybeUninit<u8>; INLINE_CAPACITY]);

impl InlineBuf {
    const fn uninit() -> Self {
        InlineBuf([MaybeUninit::uninit(); INLINE_CAPACITY])
    }
}

// ============================================================================
// Per-type vtable
// ============================================================================

struct VTable {
    layout: Layout,
    inline: bool,
    clone_into: unsafe fn(*const u8, *mut u8),
    drop_in_place: Option<unsafe fn(*mut u8)>,
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    as_any: unsafe fn(*const u8) -> *const dyn Any,
    as_any_mut: unsafe fn(*mut u8) -> *mut dyn Any,
}

struct VTableOf<T>(PhantomData<T>);

impl<T: Typed + Clone + Send + Sync> VTableOf<T> {
    const VTABLE: VTable = VTable {
        layout: Layout::new::<T>(),
        inline: size_of::<T>() <= INLINE_CAPACITY && align_of::<T>() <= INLINE_ALIGN,
        clone_into: clone_into::<T>,
        drop_in_place: if std::mem::needs_drop::<T>() {
            Some(drop_in_place::<T>)
        } else {
            None
        },
        type_id: TypeId::of::<T>,
        type_name: T::type_name,
        as_any: as_any::<T>,
        as_any_mut: as_any_mut::<T>,
    };
}

/// Allocate a block for `layout`. Zero-sized layouts get a dangling,
/// suitably aligned pointer and no allocation.
fn allocate(layout: Layout) -> Option<NonNull<u8>> {
    if layout.size() == 0 {
        return NonNull::new(ptr::without_provenance_mut(layout.align()));
    }
    // SAFETY: the layout has a non-zero size.
    NonNull::new(unsafe { alloc(layout) })
}

/// Release a block obtained from [`allocate`].
///
/// # Safety
///
/// `block` must come from `allocate(layout)` and not be released twice.
unsafe fn release(block: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
        // SAFETY: upheld by the caller.
        unsafe { dealloc(block.as_ptr(), layout) };
    }
}

/// Frees a heap block unless disarmed, so a panicking clone does not leak.
struct BlockGuard {
    block: NonNull<u8>,
    layout: Layout,
}

impl BlockGuard {
    fn disarm(self) -> NonNull<u8> {
        let block = self.block;
        std::mem::forget(self);
        block
    }
}

impl Drop for BlockGuard {
    fn drop(&mut self) {
        // SAFETY: the guard owns an unfilled block from `allocate`.
        unsafe { release(self.block, self.layout) };
    }
}

unsafe fn clone_into<T: Clone>(src: *const u8, dst: *mut u8) {
    // SAFETY: caller passes a live T at `src` and room for a T at `dst`.
    unsafe { ptr::write(dst.cast::<T>(), (*src.cast::<T>()).clone()) }
}

unsafe fn drop_in_place<T>(data: *mut u8) {
    // SAFETY: caller passes a live T that is not used afterwards.
    unsafe { ptr::drop_in_place(data.cast::<T>()) }
}

unsafe fn as_any<T: Any>(data: *const u8) -> *const dyn Any {
    data.cast::<T>() as *const dyn Any
}

unsafe fn as_any_mut<T: Any>(data: *mut u8) -> *mut dyn Any {
    data.cast::<T>() as *mut dyn Any
}

// ============================================================================
// Value
// ============================================================================

enum Storage {
    Empty,
    Inline(InlineBuf),
    Heap(NonNull<u8>),
}

/// An owned, type-erased value tagged with its [`TypeHash`].
pub struct Value {
    tag: TypeHash,
    storage: Storage,
    vtable: Option<&'static VTable>,
}

// SAFETY: only `Send + Sync` payloads can be stored.
unsafe impl Send for Value {}
unsafe impl Sync for Value {}

impl Value {
    /// The void value. Holds nothing and is tagged `void`.
    pub const fn void() -> Self {
        Value {
            tag: primitives::VOID,
            storage: Storage::Empty,
            vtable: None,
        }
    }

    /// Store `value`.
    ///
    /// `()` produces the void value. If a heap block is needed and cannot be
    /// allocated, `value` is dropped and the void value is returned.
    pub fn new<T: Typed + Clone + Send + Sync>(value: T) -> Self {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return Value::void();
        }

        let vtable: &'static VTable = &VTableOf::<T>::VTABLE;
        let storage = if vtable.inline {
            let mut buf = InlineBuf::uninit();
            // SAFETY: the buffer is large and aligned enough for T.
            unsafe { ptr::write(buf.0.as_mut_ptr().cast::<T>(), value) };
            Storage::Inline(buf)
        } else {
            let Some(block) = allocate(vtable.layout) else {
                return Value::void();
            };
            // SAFETY: the block has T's layout.
            unsafe { ptr::write(block.as_ptr().cast::<T>(), value) };
            Storage::Heap(block)
        };

        Value {
            tag: T::type_hash(),
            storage,
            vtable: Some(vtable),
        }
    }

    /// The type tag of the payload; `void` for the void value.
    #[inline]
    pub fn type_hash(&self) -> TypeHash {
        self.tag
    }

    /// The name of the payload type; `"void"` for the void value.
    pub fn type_name(&self) -> &'static str {
        match self.vtable {
            Some(vtable) => (vtable.type_name)(),
            None => "void",
        }
    }

    /// True when the value holds nothing.
    #[inline]
    pub fn is_void(&self) -> bool {
        self.vtable.is_none()
    }

    /// True when the payload lives in the inline buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }

    /// True when the payload is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.vtable
            .is_some_and(|vtable| (vtable.type_id)() == TypeId::of::<T>())
    }

    /// Borrow the payload as `T`, if it is one.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: the payload is a live T.
        Some(unsafe { &*self.data_ptr().cast::<T>() })
    }

    /// Mutably borrow the payload as `T`, if it is one.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: the payload is a live T, borrowed uniquely through `self`.
        Some(unsafe { &mut *self.data_ptr_mut().cast::<T>() })
    }

    /// Borrow the payload as `T` without checking.
    ///
    /// # Safety
    ///
    /// The value must not be void and its payload must be a `T`.
    pub unsafe fn get_unchecked<T: 'static>(&self) -> &T {
        // SAFETY: upheld by the caller.
        unsafe { &*self.data_ptr().cast::<T>() }
    }

    /// Move the payload out as `T`. Returns `self` unchanged on mismatch.
    pub fn into_inner<T: 'static>(self) -> Result<T, Value> {
        if !self.is::<T>() {
            return Err(self);
        }

        let mut this = ManuallyDrop::new(self);
        // SAFETY: the payload is a live T and is not dropped again.
        let value = unsafe { ptr::read(this.data_ptr_mut().cast::<T>()) };
        if let (Storage::Heap(block), Some(vtable)) = (&this.storage, this.vtable) {
            // SAFETY: the block came from `allocate` with this layout.
            unsafe { release(*block, vtable.layout) };
        }
        Ok(value)
    }

    /// Move the contents out, leaving the void value behind.
    #[inline]
    pub fn take(&mut self) -> Value {
        std::mem::replace(self, Value::void())
    }

    /// Borrow the payload as `dyn Any`; `None` for the void value.
    pub fn as_any(&self) -> Option<&dyn Any> {
        let vtable = self.vtable?;
        // SAFETY: the vtable matches the payload.
        Some(unsafe { &*(vtable.as_any)(self.data_ptr()) })
    }

    /// Mutably borrow the payload as `dyn Any`; `None` for the void value.
    pub fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        let vtable = self.vtable?;
        // SAFETY: the vtable matches the payload, borrowed uniquely.
        Some(unsafe { &mut *(vtable.as_any_mut)(self.data_ptr_mut()) })
    }

    fn data_ptr(&self) -> *const u8 {
        match &self.storage {
            Storage::Empty => ptr::null(),
            Storage::Inline(buf) => buf.0.as_ptr().cast(),
            Storage::Heap(block) => block.as_ptr(),
        }
    }

    fn data_ptr_mut(&mut self) -> *mut u8 {
        match &mut self.storage {
            Storage::Empty => ptr::null_mut(),
            Storage::Inline(buf) => buf.0.as_mut_ptr().cast(),
            Storage::Heap(block) => block.as_ptr(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::void()
    }
}

impl Clone for Value {
    /// Deep copy through the payload's `Clone`. A failed heap allocation
    /// yields the void value.
    fn clone(&self) -> Self {
        let Some(vtable) = self.vtable else {
            return Value::void();
        };

        let storage = match &self.storage {
            Storage::Empty => Storage::Empty,
            Storage::Inline(_) => {
                let mut buf = InlineBuf::uninit();
                // SAFETY: source is a live payload, buffer fits it.
                unsafe { (vtable.clone_into)(self.data_ptr(), buf.0.as_mut_ptr().cast()) };
                Storage::Inline(buf)
            }
            Storage::Heap(_) => {
                let Some(block) = allocate(vtable.layout) else {
                    return Value::void();
                };
                let guard = BlockGuard {
                    block,
                    layout: vtable.layout,
                };
                // SAFETY: source is a live payload, block has its layout.
                unsafe { (vtable.clone_into)(self.data_ptr(), block.as_ptr()) };
                Storage::Heap(guard.disarm())
            }
        };

        Value {
            tag: self.tag,
            storage,
            vtable: Some(vtable),
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        let Some(vtable) = self.vtable else {
            return;
        };
        if let Some(drop_fn) = vtable.drop_in_place {
            // SAFETY: the payload is live and dropped exactly once.
            unsafe { drop_fn(self.data_ptr_mut()) };
        }
        if let Storage::Heap(block) = self.storage {
            // SAFETY: the block came from `allocate` with this layout.
            unsafe { release(block, vtable.layout) };
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_name())
            .field("hash", &self.tag)
            .field("inline", &self.is_inline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct Big([u64; 8]);

    impl Typed for Big {
        fn type_name() -> &'static str {
            "Big"
        }
    }

    #[derive(Clone)]
    struct Counted(Arc<AtomicUsize>);

    impl Typed for Counted {
        fn type_name() -> &'static str {
            "Counted"
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn void_value() {
        let v = Value::void();
        assert!(v.is_void());
        assert_eq!(v.type_hash(), primitives::VOID);
        assert_eq!(v.type_name(), "void");
        assert!(v.as_any().is_none());
        assert!(Value::new(()).is_void());
    }

    #[test]
    fn small_payload_is_inline() {
        let v = Value::new(7u8);
        assert!(v.is_inline());
        assert_eq!(v.get::<u8>(), Some(&7));
        assert_eq!(v.get::<i8>(), None);
    }

    #[test]
    fn large_payload_is_on_heap() {
        let v = Value::new(Big([3; 8]));
        assert!(!v.is_inline());
        assert_eq!(v.get::<Big>(), Some(&Big([3; 8])));
        assert_eq!(v.type_hash(), TypeHash::from_name("Big"));
    }

    #[test]
    fn clone_is_deep() {
        let original = Value::new(String::from("hello"));
        let mut copy = original.clone();
        copy.get_mut::<String>().unwrap().push_str(" world");

        assert_eq!(original.get::<String>().unwrap(), "hello");
        assert_eq!(copy.get::<String>().unwrap(), "hello world");

        let big = Value::new(Big([1; 8]));
        let big_copy = big.clone();
        assert_eq!(big_copy.get::<Big>(), big.get::<Big>());
    }

    #[test]
    fn take_leaves_void() {
        let mut v = Value::new(5i64);
        let taken = v.take();
        assert!(v.is_void());
        assert_eq!(taken.get::<i64>(), Some(&5));
    }

    #[test]
    fn into_inner_checks_type() {
        let v = Value::new(1.5f64);
        let v = v.into_inner::<f32>().unwrap_err();
        assert_eq!(v.into_inner::<f64>().ok(), Some(1.5));

        let heap = Value::new(Big([9; 8]));
        assert_eq!(heap.into_inner::<Big>().ok(), Some(Big([9; 8])));
    }

    #[test]
    fn drop_runs_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let v = Value::new(Counted(drops.clone()));
            let copy = v.clone();
            drop(copy);
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        let v = Value::new(Counted(drops.clone()));
        let inner = v.into_inner::<Counted>().ok().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        drop(inner);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn as_any_downcasts() {
        let mut v = Value::new(10u32);
        assert_eq!(v.as_any().unwrap().downcast_ref::<u32>(), Some(&10));
        *v.as_any_mut().unwrap().downcast_mut::<u32>().unwrap() = 11;
        assert_eq!(v.get::<u32>(), Some(&11));
    }

    #[derive(Clone, Debug, PartialEq)]
    #[repr(align(32))]
    struct OverAligned;

    impl Typed for OverAligned {
        fn type_name() -> &'static str {
            "OverAligned"
        }
    }

    #[derive(Debug)]
    struct Fragile([u64; 8]);

    impl Clone for Fragile {
        fn clone(&self) -> Self {
            panic!("clone failed");
        }
    }

    impl Typed for Fragile {
        fn type_name() -> &'static str {
            "Fragile"
        }
    }

    #[test]
    fn over_aligned_zero_sized_payload() {
        let v = Value::new(OverAligned);
        assert!(!v.is_inline());
        let address = v.get::<OverAligned>().map(|p| p as *const OverAligned as usize);
        assert_eq!(address.map(|a| a % 32), Some(0));

        let copy = v.clone();
        assert_eq!(copy.get::<OverAligned>(), Some(&OverAligned));
        assert_eq!(v.into_inner::<OverAligned>().ok(), Some(OverAligned));
    }

    #[test]
    fn panicking_clone_leaves_original_intact() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let v = Value::new(Fragile([4; 8]));
        assert!(!v.is_inline());
        assert!(catch_unwind(AssertUnwindSafe(|| v.clone())).is_err());
        assert_eq!(v.get::<Fragile>().map(|f| f.0[7]), Some(4));
    }

    #[test]
    fn unchecked_read() {
        let v = Value::new(-3i16);
        assert_eq!(unsafe { *v.get_unchecked::<i16>() }, -3);
    }
}
