#![cfg(target_os = "linux")]
//! Process-shared objects in an anonymous shared mapping, driven by a
//! forked child.
//!
//! The child only touches the mapping and calls `_exit`; it never returns
//! into the test harness.

use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rtpi_abi::{
    RTPI_COND_PSHARED, RTPI_MUTEX_PSHARED, pi_cond_init, pi_cond_signal, pi_cond_t,
    pi_cond_wait, pi_mutex_init, pi_mutex_lock, pi_mutex_t, pi_mutex_trylock, pi_mutex_unlock,
};

#[repr(C)]
struct Region {
    mutex: pi_mutex_t,
    cond: pi_cond_t,
    flag: AtomicU32,
}

struct Mapping {
    region: *mut Region,
}

impl Mapping {
    fn new() -> Self {
        let len = std::mem::size_of::<Region>();
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(addr, libc::MAP_FAILED, "mmap failed");
        let region = addr.cast::<Region>();
        unsafe {
            assert_eq!(
                pi_mutex_init(ptr::addr_of_mut!((*region).mutex), RTPI_MUTEX_PSHARED),
                0
            );
            assert_eq!(
                pi_cond_init(ptr::addr_of_mut!((*region).cond), RTPI_COND_PSHARED),
                0
            );
        }
        Self { region }
    }

    fn mutex(&self) -> *mut pi_mutex_t {
        unsafe { ptr::addr_of_mut!((*self.region).mutex) }
    }

    fn cond(&self) -> *mut pi_cond_t {
        unsafe { ptr::addr_of_mut!((*self.region).cond) }
    }

    fn flag(&self) -> &AtomicU32 {
        unsafe { &(*self.region).flag }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.region.cast(), std::mem::size_of::<Region>()) };
    }
}

/// Run `child` in a forked process and return its exit status.
fn fork_child(child: impl FnOnce() -> i32) -> libc::pid_t {
    let pid = unsafe { libc::fork() };
    assert!(pid >= 0, "fork failed");
    if pid == 0 {
        let code = child();
        unsafe { libc::_exit(code) };
    }
    pid
}

fn wait_exit_code(pid: libc::pid_t) -> i32 {
    let mut status = 0;
    let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
    assert_eq!(rc, pid);
    assert!(libc::WIFEXITED(status), "child did not exit cleanly");
    libc::WEXITSTATUS(status)
}

fn spin_until(what: &str, mut done: impl FnMut() -> bool) {
    let give_up = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < give_up, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn mutex_handoff_across_processes() {
    let map = Mapping::new();
    unsafe { assert_eq!(pi_mutex_lock(map.mutex()), 0) };

    let (mutex, flag) = (map.mutex(), map.flag());
    let pid = fork_child(|| unsafe {
        if pi_mutex_trylock(mutex) != libc::EBUSY {
            return 1;
        }
        // Blocks in the kernel until the parent releases.
        if pi_mutex_lock(mutex) != 0 {
            return 2;
        }
        flag.store(1, Ordering::SeqCst);
        if pi_mutex_unlock(mutex) != 0 {
            return 3;
        }
        0
    });

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(map.flag().load(Ordering::SeqCst), 0);
    unsafe { assert_eq!(pi_mutex_unlock(map.mutex()), 0) };
    assert_eq!(wait_exit_code(pid), 0);
    assert_eq!(map.flag().load(Ordering::SeqCst), 1);
    assert!(unsafe { !(*map.mutex()).is_locked() });
}

#[test]
fn condvar_wakes_waiter_in_other_process() {
    let map = Mapping::new();
    let (mutex, cond, flag) = (map.mutex(), map.cond(), map.flag());

    let pid = fork_child(|| unsafe {
        if pi_mutex_lock(mutex) != 0 {
            return 1;
        }
        while flag.load(Ordering::SeqCst) == 0 {
            if pi_cond_wait(cond, mutex) != 0 {
                return 2;
            }
        }
        flag.store(2, Ordering::SeqCst);
        if pi_mutex_unlock(mutex) != 0 {
            return 3;
        }
        0
    });

    spin_until("child registration", || unsafe { (*cond).waiters() } == 1);
    unsafe {
        assert_eq!(pi_mutex_lock(mutex), 0);
        flag.store(1, Ordering::SeqCst);
        assert_eq!(pi_cond_signal(cond, mutex), 0);
        assert_eq!(pi_mutex_unlock(mutex), 0);
    }
    assert_eq!(wait_exit_code(pid), 0);
    assert_eq!(map.flag().load(Ordering::SeqCst), 2);
    assert_eq!(unsafe { (*cond).waiters() }, 0);
}
