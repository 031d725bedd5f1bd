use core::cell::RefCell;
use core::cell::UnsafeCell;
use core::future::Future;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::pin::Pin;
use core::task::Waker;
use core::task::{Context, Poll};

struct MutexState {
    locked: bool,
    waker: Option<Waker>,
}

/// A generic mutex that does not depend on the underlying async runtime.
///
/// The idea is that this is used to synchronize different parts inside one
/// single task that may run concurrently through a `select`-style
/// interleaving, not across real OS threads. `fpv-fec`'s encoder/decoder
/// reconfiguration window (spec §5, "shared resource policy") uses this to
/// protect the descriptor from a caller that mutates it concurrently with the
/// worker that drains queued frames.
pub struct Mutex<T> {
    value: UnsafeCell<T>,
    state: RefCell<MutexState>,
    _no_send_sync: PhantomData<*mut T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Mutex {
            value: UnsafeCell::new(value),
            state: RefCell::new(MutexState {
                locked: false,
                waker: None,
            }),
            _no_send_sync: PhantomData,
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, T> {
        LockFuture { mutex: self }.await;
        MutexGuard { mutex: self }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut state = self.state.borrow_mut();
        if !state.locked {
            state.locked = true;
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    /// Get access to the protected value without locking. This is similar to
    /// `std::sync::Mutex::get_mut`.
    pub fn get_mut(&mut self) -> &mut T {
        // Safety: &mut gives us exclusive access to T.
        self.value.get_mut()
    }
}

/// Represents current exclusive access to the resource protected by a mutex.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // Safety: Only one guard can exist at a time.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Safety: Only one guard can exist at a time.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        let mut mutex_state = self.mutex.state.borrow_mut();
        mutex_state.locked = false;
        if let Some(waker) = mutex_state.waker.take() {
            waker.wake()
        }
    }
}

struct LockFuture<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Future for LockFuture<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut mutex_state = self.mutex.state.borrow_mut();
        if mutex_state.locked {
            let new_waker = cx.waker();
            match &mut mutex_state.waker {
                Some(waker) if waker.will_wake(new_waker) => {
                    waker.clone_from(new_waker);
                }
                waker @ Some(_) => {
                    waker.take().unwrap().wake();
                    *waker = Some(new_waker.clone());
                }
                waker @ None => *waker = Some(new_waker.clone()),
            };
            Poll::Pending
        } else {
            mutex_state.locked = true;
            Poll::Ready(())
        }
    }
}

#[cfg(test)]
mod tests {
    use pollster::FutureExt as _;

    use super::Mutex;

    #[test]
    fn lock_excludes_concurrent_mutation() {
        async {
            let mut mutex = Mutex::new(0usize);
            {
                let mut guard = mutex.lock().await;
                *guard += 1;
                assert_eq!(*guard, 1);
            }
            assert_eq!(*mutex.get_mut(), 1);
        }
        .block_on()
    }

    #[test]
    fn try_lock_fails_while_locked() {
        let mutex = Mutex::new(0usize);
        let guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }
}
