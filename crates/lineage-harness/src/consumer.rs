#![forbid(unsafe_code)]

//! Widgets that rebuild from a provided value.

use std::rc::Rc;

use lineage_core::{Context, Result};

use crate::widget::Widget;

/// Watches the nearest `T` and builds from it.
#[must_use]
pub fn consumer<T: Clone + 'static>(
    build: impl Fn(&Context, T) -> Result<Widget> + 'static,
) -> Widget {
    Widget::builder(move |cx| {
        let value = cx.watch::<T>()?;
        build(cx, value)
    })
}

/// Selects a projection of the nearest `T` and builds from it. Rebuilds
/// only when the projection changes.
#[must_use]
pub fn selector<T, R>(
    select: impl Fn(&T) -> R + 'static,
    build: impl Fn(&Context, R) -> Result<Widget> + 'static,
) -> Widget
where
    T: Clone + 'static,
    R: PartialEq + Clone + 'static,
{
    let select = Rc::new(select);
    Widget::builder(move |cx| {
        let select = Rc::clone(&select);
        let selected = cx.select(move |value: &T| select(value))?;
        build(cx, selected)
    })
}
