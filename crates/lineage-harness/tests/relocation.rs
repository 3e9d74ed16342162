//! Moving provider subtrees without detaching them.
//!
//! 1. Reordering keyed siblings keeps every element and value
//! 2. Reparenting through a global key keeps the provider node
//! 3. After reparenting, dependents resolve against the new ancestors
//! 4. A global key dropped from the tree unmounts normally

use std::cell::RefCell;
use std::rc::Rc;

use lineage_core::Provider;
use lineage_core::testing::CallCounter;
use lineage_harness::{Key, Tree, Widget, consumer};

fn owned(made: &CallCounter, freed: &CallCounter, value: u32) -> Provider<u32> {
    let made = made.clone();
    let freed = freed.clone();
    Provider::new(move |_| {
        made.hit();
        Ok(value)
    })
    .dispose(move |_, _| freed.hit())
}

fn reading_leaf(key: &str) -> Widget {
    Widget::builder(|cx| cx.read::<u32>().map(|_| Widget::empty())).keyed(Key::local(key))
}

#[test]
fn keyed_reorder_keeps_elements() {
    let (made, freed) = (CallCounter::new(), CallCounter::new());
    let a = Widget::provider(owned(&made, &freed, 1), reading_leaf("leaf-a")).keyed(Key::local("a"));
    let b = Widget::provider(owned(&made, &freed, 2), reading_leaf("leaf-b")).keyed(Key::local("b"));
    let mut tree = Tree::new();

    tree.set_root(Widget::column([a.clone(), b.clone()])).unwrap();
    let before = tree.stats();
    let leaf_a = tree.context_of(&Key::local("leaf-a")).unwrap();

    tree.set_root(Widget::column([b, a])).unwrap();
    let after = tree.stats();
    assert_eq!(after.mounted, before.mounted);
    assert_eq!(after.unmounted, before.unmounted);
    assert_eq!(made.count(), 2);
    assert_eq!(freed.count(), 0);

    let moved = tree.context_of(&Key::local("leaf-a")).unwrap();
    assert!(moved.ptr_eq(&leaf_a));
    assert_eq!(moved.read::<u32>(), Ok(1));
}

fn side(label: &'static str, key: &str, children: Vec<Widget>) -> Widget {
    Widget::provider(
        Provider::value(String::from(label)),
        Widget::column(children).keyed(Key::local(key)),
    )
}

#[test]
fn global_key_reparents_without_reconstruction() {
    let (made, freed) = (CallCounter::new(), CallCounter::new());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = Rc::clone(&seen);
    let mobile = Widget::provider(
        owned(&made, &freed, 7),
        consumer::<String>(move |cx, side| {
            let value = cx.watch::<u32>()?;
            seen_clone.borrow_mut().push(format!("{side}:{value}"));
            Ok(Widget::empty())
        }),
    )
    .keyed(Key::global(1));
    let mut tree = Tree::new();

    tree.set_root(Widget::column([
        side("left", "left", vec![mobile.clone()]),
        side("right", "right", vec![]),
    ]))
    .unwrap();
    let node = tree.node_of::<u32>(&Key::global(1)).unwrap();

    tree.set_root(Widget::column([
        side("left", "left", vec![]),
        side("right", "right", vec![mobile.clone()]),
    ]))
    .unwrap();

    assert_eq!(made.count(), 1);
    assert_eq!(freed.count(), 0);
    assert_eq!(tree.stats().relocated, 1);
    let moved = tree.node_of::<u32>(&Key::global(1)).unwrap();
    assert!(Rc::ptr_eq(&node, &moved));
    assert_eq!(
        *seen.borrow(),
        vec![String::from("left:7"), String::from("right:7")]
    );

    // Back to the left, in the opposite traversal order.
    tree.set_root(Widget::column([
        side("left", "left", vec![mobile]),
        side("right", "right", vec![]),
    ]))
    .unwrap();
    assert_eq!(made.count(), 1);
    assert_eq!(tree.stats().relocated, 2);
    assert_eq!(seen.borrow().last().map(String::as_str), Some("left:7"));

    tree.clear().unwrap();
    assert_eq!(freed.count(), 1);
}

#[test]
fn dropped_global_key_unmounts() {
    let (made, freed) = (CallCounter::new(), CallCounter::new());
    let mobile =
        Widget::provider(owned(&made, &freed, 1), reading_leaf("leaf")).keyed(Key::global(9));
    let mut tree = Tree::new();

    tree.set_root(Widget::column([mobile])).unwrap();
    tree.set_root(Widget::column([])).unwrap();
    assert_eq!(made.count(), 1);
    assert_eq!(freed.count(), 1);
    assert!(tree.node_of::<u32>(&Key::global(9)).is_none());
    assert_eq!(tree.len(), 1);
}
