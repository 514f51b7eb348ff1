//! Demo driver: matrix multiplication over the managed range
//!
//! Places three square integer matrices inside the paged range and
//! multiplies them the naive way. With a small resident budget the row/
//! column access pattern forces steady eviction traffic, which is the whole
//! point: the counters at the end show how hard the engine worked.
//!
//! Usage: `softvm-demo [max_resident] [fifo|clock]`

use softvm_pager::{PolicyKind, NUM_PAGES, VMEM_BYTES};

/// Matrix dimension; three N x N i32 matrices must fit in the range.
const N: usize = 96;

fn main() {
    softvm_pager::logger::init();

    let mut args = std::env::args().skip(1);
    let max_resident: usize = args
        .next()
        .map(|a| a.parse().expect("max_resident must be a number"))
        .unwrap_or(8);
    let kind = match args.next().as_deref() {
        None | Some("clock") => PolicyKind::Clock,
        Some("fifo") => PolicyKind::Fifo,
        Some(other) => {
            eprintln!("unknown policy '{}', expected fifo or clock", other);
            std::process::exit(2);
        }
    };

    assert!(
        3 * N * N * std::mem::size_of::<i32>() <= VMEM_BYTES,
        "matrices do not fit in the managed range"
    );

    let base = match softvm_pager::init(max_resident, kind) {
        Ok(base) => base as *mut i32,
        Err(e) => {
            eprintln!("init failed: {}", e);
            std::process::exit(1);
        }
    };

    // SAFETY: all offsets below stay inside the managed range (checked
    // above), and the pager makes every access behave like ordinary memory.
    unsafe {
        let a = base;
        let b = base.add(N * N);
        let c = base.add(2 * N * N);

        for i in 0..N {
            for j in 0..N {
                a.add(i * N + j).write_volatile(((i + j) % 7) as i32);
                b.add(i * N + j).write_volatile(((i * j) % 5) as i32);
            }
        }

        for i in 0..N {
            for j in 0..N {
                let mut acc = 0i32;
                for k in 0..N {
                    acc += a.add(i * N + k).read_volatile() * b.add(k * N + j).read_volatile();
                }
                c.add(i * N + j).write_volatile(acc);
            }
        }

        let mut checksum = 0i64;
        for i in 0..N * N {
            checksum += c.add(i).read_volatile() as i64;
        }
        println!("checksum: {}", checksum);
    }

    println!(
        "pages: {}  resident budget: {}  policy: {}",
        NUM_PAGES, max_resident, kind
    );
    println!(
        "faults: {}  loads: {}",
        softvm_pager::num_faults(),
        softvm_pager::num_loads()
    );

    if let Err(e) = softvm_pager::cleanup() {
        eprintln!("cleanup failed: {}", e);
        std::process::exit(1);
    }
}
