use kernel_sync::SpinLock;
use std::collections::VecDeque;
use std::panic;

#[test]
fn guard_releases_on_drop() {
    let l = SpinLock::new(VecDeque::from([0_u64, 1, 2]));

    {
        let mut g = l.lock();
        g.pop_front();
    }
    assert!(!l.is_locked());

    {
        let mut g = l.lock();
        g.push_back(3);
        assert_eq!(g.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
    }
}

#[test]
fn try_lock_fails_while_held() {
    let l = SpinLock::new(7_u8);

    let g1 = l.try_lock();
    assert!(g1.is_some());
    assert!(l.is_locked());
    assert!(l.try_lock().is_none());

    drop(g1);
    assert!(l.try_lock().is_some());
}

#[test]
fn debug_shows_locked_state() {
    let l = SpinLock::new(5_u32);
    assert_eq!(format!("{l:?}"), "SpinLock { data: 5 }");
    let _g = l.lock();
    assert_eq!(format!("{l:?}"), "SpinLock { <locked> }");
}

#[test]
fn into_inner_and_get_mut() {
    let mut l = SpinLock::new(vec![1, 2, 3]);
    l.get_mut().push(4);
    assert_eq!(l.into_inner(), [1, 2, 3, 4]);
}

#[test]
fn free_list_is_never_handed_out_twice() {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let threads = 8;
    let frames_per_thread = 500;

    let free = Arc::new(SpinLock::new(
        (0..threads * frames_per_thread).collect::<Vec<usize>>(),
    ));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let free = Arc::clone(&free);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            let mut taken = Vec::with_capacity(frames_per_thread);
            for _ in 0..frames_per_thread {
                let frame = free.with_lock(Vec::pop).expect("free list drained early");
                taken.push(frame);
                thread::yield_now();
            }
            taken
        }));
    }

    let mut all: Vec<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), threads * frames_per_thread);
    assert!(free.lock().is_empty());
}

#[test]
fn lock_is_released_on_panic() {
    let l = SpinLock::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");

    let val = l.with_lock(|v| *v);
    assert_eq!(val, 123);
}

#[test]
fn spinlock_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let l = SpinLock::new(0u8);
    takes_sync(&l);
}
