//! Property-based lifecycle invariants over random mount/read/remove
//! sequences.
//!
//! 1. A lazy provider constructs at most once per mount, and only if read
//! 2. Teardown runs exactly for the constructed values that were removed
//! 3. After the tree is cleared every constructed value was torn down
//! 4. Eager providers construct once per mount, read or not

use std::cell::RefCell;
use std::rc::Rc;

use lineage_core::Provider;
use lineage_core::testing::CallCounter;
use lineage_harness::{Key, Tree, Widget};
use proptest::prelude::*;

const SLOTS: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Op {
    Toggle(usize),
    Read(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SLOTS).prop_map(Op::Toggle),
        (0..SLOTS).prop_map(Op::Read),
    ]
}

struct Fixture {
    made: Vec<CallCounter>,
    freed: Vec<CallCounter>,
    /// Slot value handed to each teardown, to catch a teardown running on
    /// the wrong provider.
    torn: Rc<RefCell<Vec<usize>>>,
    eager: bool,
}

impl Fixture {
    fn new(eager: bool) -> Self {
        Self {
            made: (0..SLOTS).map(|_| CallCounter::new()).collect(),
            freed: (0..SLOTS).map(|_| CallCounter::new()).collect(),
            torn: Rc::new(RefCell::new(Vec::new())),
            eager,
        }
    }

    fn slot(&self, index: usize) -> Widget {
        let made = self.made[index].clone();
        let freed = self.freed[index].clone();
        let torn = Rc::clone(&self.torn);
        let provider = Provider::new(move |_| {
            made.hit();
            Ok(index)
        })
        .dispose(move |_, value| {
            freed.hit();
            torn.borrow_mut().push(value);
        })
        .lazy(!self.eager);
        Widget::provider(provider, Widget::empty().keyed(Key::local(format!("leaf{index}"))))
            .keyed(Key::local(format!("slot{index}")))
    }

    fn widget(&self, present: &[bool]) -> Widget {
        Widget::column(
            present
                .iter()
                .enumerate()
                .filter(|(_, present)| **present)
                .map(|(index, _)| self.slot(index)),
        )
    }

    fn total(counters: &[CallCounter]) -> u32 {
        counters.iter().map(CallCounter::count).sum()
    }
}

proptest! {
    #[test]
    fn lazy_construction_and_teardown_are_gated(ops in proptest::collection::vec(arb_op(), 0..=40)) {
        let fixture = Fixture::new(false);
        let mut present = [true; SLOTS];
        let mut constructed = [false; SLOTS];
        let mut expected_made = [0_u32; SLOTS];
        let mut expected_freed = [0_u32; SLOTS];
        let mut tree = Tree::new();
        tree.set_root(fixture.widget(&present)).unwrap();

        for op in ops {
            match op {
                Op::Toggle(index) => {
                    if present[index] && constructed[index] {
                        expected_freed[index] += 1;
                    }
                    present[index] = !present[index];
                    constructed[index] = false;
                    tree.set_root(fixture.widget(&present)).unwrap();
                }
                Op::Read(index) => {
                    let leaf = tree.context_of(&Key::local(format!("leaf{index}")));
                    match leaf {
                        Some(cx) => {
                            prop_assert!(present[index]);
                            prop_assert_eq!(cx.read::<usize>(), Ok(index));
                            if !constructed[index] {
                                constructed[index] = true;
                                expected_made[index] += 1;
                            }
                        }
                        None => prop_assert!(!present[index]),
                    }
                }
            }
            for index in 0..SLOTS {
                prop_assert_eq!(fixture.made[index].count(), expected_made[index]);
                prop_assert_eq!(fixture.freed[index].count(), expected_freed[index]);
            }
        }

        tree.clear().unwrap();
        prop_assert_eq!(Fixture::total(&fixture.made), Fixture::total(&fixture.freed));
        let mut torn = fixture.torn.borrow().clone();
        torn.sort_unstable();
        let mut expected: Vec<usize> = (0..SLOTS)
            .flat_map(|index| std::iter::repeat_n(index, fixture.made[index].count() as usize))
            .collect();
        expected.sort_unstable();
        prop_assert_eq!(torn, expected);
    }
}

proptest! {
    #[test]
    fn eager_providers_construct_once_per_mount(toggles in proptest::collection::vec(0..SLOTS, 0..=20)) {
        let fixture = Fixture::new(true);
        let mut present = [true; SLOTS];
        let mut mounts = [1_u32; SLOTS];
        let mut tree = Tree::new();
        tree.set_root(fixture.widget(&present)).unwrap();

        for index in toggles {
            present[index] = !present[index];
            if present[index] {
                mounts[index] += 1;
            }
            tree.set_root(fixture.widget(&present)).unwrap();
        }
        for index in 0..SLOTS {
            prop_assert_eq!(fixture.made[index].count(), mounts[index]);
        }

        tree.clear().unwrap();
        prop_assert_eq!(Fixture::total(&fixture.made), Fixture::total(&fixture.freed));
    }
}
