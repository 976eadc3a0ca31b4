#![cfg(target_os = "linux")]

use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rtpi_abi::{
    RTPI_MUTEX_PSHARED, pi_mutex_alloc, pi_mutex_destroy, pi_mutex_free, pi_mutex_init,
    pi_mutex_lock, pi_mutex_t, pi_mutex_trylock, pi_mutex_unlock,
};

/// Raw pointer that may cross threads; the pointee is a `Sync` mutex.
#[derive(Clone, Copy)]
struct SendPtr(*mut pi_mutex_t);
unsafe impl Send for SendPtr {}

#[test]
fn object_is_one_cache_line() {
    assert_eq!(size_of::<pi_mutex_t>(), 64);
    assert_eq!(align_of::<pi_mutex_t>(), 64);
}

#[test]
fn null_pointers_are_einval() {
    let null = std::ptr::null_mut();
    unsafe {
        assert_eq!(pi_mutex_init(null, 0), libc::EINVAL);
        assert_eq!(pi_mutex_lock(null), libc::EINVAL);
        assert_eq!(pi_mutex_trylock(null), libc::EINVAL);
        assert_eq!(pi_mutex_unlock(null), libc::EINVAL);
        assert_eq!(pi_mutex_destroy(null), libc::EINVAL);
        pi_mutex_free(null);
    }
}

#[test]
fn lock_trylock_unlock_roundtrip() {
    let m = pi_mutex_alloc();
    unsafe {
        assert_eq!(pi_mutex_init(m, 0), 0);
        assert_eq!(pi_mutex_trylock(m), 0);
        assert_eq!(pi_mutex_trylock(m), libc::EBUSY);
        assert_eq!(pi_mutex_lock(m), libc::EDEADLK);
        assert_eq!(pi_mutex_destroy(m), libc::EBUSY);
        assert_eq!(pi_mutex_unlock(m), 0);
        assert_eq!(pi_mutex_unlock(m), libc::EPERM);
        assert_eq!(pi_mutex_destroy(m), 0);
        pi_mutex_free(m);
    }
}

#[test]
fn init_validates_flags() {
    let m = pi_mutex_alloc();
    unsafe {
        assert_eq!(pi_mutex_init(m, RTPI_MUTEX_PSHARED), 0);
        assert!((*m).is_pshared());
        assert_eq!(pi_mutex_init(m, 0x2), libc::EINVAL);
        assert!((*m).is_pshared());
        assert_eq!(pi_mutex_init(m, 0), 0);
        assert!(!(*m).is_pshared());
        pi_mutex_free(m);
    }
}

#[test]
fn init_accepts_uninitialized_storage() {
    let mut slot = std::mem::MaybeUninit::<pi_mutex_t>::uninit();
    unsafe {
        assert_eq!(pi_mutex_init(slot.as_mut_ptr(), 0), 0);
        assert_eq!(pi_mutex_lock(slot.as_mut_ptr()), 0);
        assert_eq!(pi_mutex_unlock(slot.as_mut_ptr()), 0);
        assert_eq!(pi_mutex_destroy(slot.as_mut_ptr()), 0);
    }
}

#[test]
fn cross_thread_unlock_is_eperm() {
    let m = SendPtr(pi_mutex_alloc());
    unsafe {
        assert_eq!(pi_mutex_lock(m.0), 0);
    }
    let rc = thread::spawn(move || {
        let m = m;
        unsafe { (pi_mutex_trylock(m.0), pi_mutex_unlock(m.0)) }
    })
    .join()
    .unwrap();
    assert_eq!(rc, (libc::EBUSY, libc::EPERM));
    unsafe {
        assert_eq!(pi_mutex_unlock(m.0), 0);
        pi_mutex_free(m.0);
    }
}

#[test]
fn counter_is_exact_under_contention() {
    const THREADS: usize = 4;
    const ITERS: usize = 5_000;
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let m = SendPtr(pi_mutex_alloc());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn(move || {
                let m = m;
                for _ in 0..ITERS {
                    unsafe { assert_eq!(pi_mutex_lock(m.0), 0) };
                    // Non-atomic read-modify-write under the lock.
                    let v = COUNTER.load(Ordering::Relaxed);
                    COUNTER.store(v + 1, Ordering::Relaxed);
                    unsafe { assert_eq!(pi_mutex_unlock(m.0), 0) };
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(COUNTER.load(Ordering::Relaxed), THREADS * ITERS);
    unsafe { pi_mutex_free(m.0) };
}
