//! Benchmarks for provider lookup through nested scopes.
//!
//! Lookup is a persistent-map probe, so reading the nearest provider and
//! reading one 256 levels up should cost about the same.
//!
//! Run with: cargo bench -p lineage-core --bench lookup_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::rc::Rc;

use lineage_core::{Context, ElementId, InheritedNode, Provider, Scheduler, Scope};

const DEPTHS: &[usize] = &[1, 16, 256];

struct NoopScheduler;

impl Scheduler for NoopScheduler {
    fn mark_needs_build(&self, _element: ElementId) {}
}

/// A root `String` provider followed by `depth` nested `u32` providers.
fn nested(depth: usize, scheduler: &Rc<dyn Scheduler>) -> (Scope, Vec<Rc<dyn lineage_core::AnyInherited>>) {
    let mut nodes: Vec<Rc<dyn lineage_core::AnyInherited>> = Vec::with_capacity(depth + 1);
    let mut scope = Scope::root();

    let cx = Context::new(ElementId::next(), scope.clone(), Rc::clone(scheduler));
    let root = Rc::new(InheritedNode::new(cx, Provider::value(String::from("root"))));
    root.attach().expect("attach root");
    scope = scope.provide(root.clone());
    nodes.push(root);

    for level in 0..depth {
        let cx = Context::new(ElementId::next(), scope.clone(), Rc::clone(scheduler));
        let node = Rc::new(InheritedNode::new(cx, Provider::value(level as u32)));
        node.attach().expect("attach level");
        scope = scope.provide(node.clone());
        nodes.push(node);
    }
    (scope, nodes)
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("provider/lookup");
    let scheduler: Rc<dyn Scheduler> = Rc::new(NoopScheduler);

    for &depth in DEPTHS {
        let (scope, _nodes) = nested(depth, &scheduler);
        let cx = Context::new(ElementId::next(), scope, Rc::clone(&scheduler));

        group.bench_with_input(BenchmarkId::new("read_nearest", depth), &cx, |b, cx| {
            b.iter(|| black_box(cx.read::<u32>()));
        });
        group.bench_with_input(BenchmarkId::new("read_root", depth), &cx, |b, cx| {
            b.iter(|| black_box(cx.read::<String>()));
        });
    }
    group.finish();
}

fn bench_scope_extend(c: &mut Criterion) {
    let scheduler: Rc<dyn Scheduler> = Rc::new(NoopScheduler);
    c.bench_function("provider/scope/extend_256", |b| {
        b.iter(|| black_box(nested(256, &scheduler).0.len()));
    });
}

criterion_group!(benches, bench_lookup, bench_scope_extend);
criterion_main!(benches);
