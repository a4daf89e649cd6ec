//! Stream combinators used to wire datasources together.

use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};

/// Drop items equal to the previously yielded item.
pub fn skip_repeats<St>(items: St) -> impl Stream<Item = St::Item> + Send
where
    St: Stream + Send,
    St::Item: Clone + PartialEq + Send,
{
    items
        .scan(None, |last: &mut Option<St::Item>, item| {
            let repeated = last.as_ref() == Some(&item);
            if !repeated {
                *last = Some(item.clone());
            }
            future::ready(Some((!repeated).then_some(item)))
        })
        .filter_map(future::ready)
}

enum Latest<A, B, C> {
    First(A),
    Second(B),
    Third(C),
}

/// Latest value of each stream, yielded on every change once all three
/// streams have produced a value.
///
/// Ends when all three streams have ended.
pub fn combine_latest3<A, B, C>(
    first: BoxStream<'static, A>,
    second: BoxStream<'static, B>,
    third: BoxStream<'static, C>,
) -> BoxStream<'static, (A, B, C)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    let tagged = stream::select(
        stream::select(first.map(Latest::First), second.map(Latest::Second)),
        third.map(Latest::Third),
    );

    tagged
        .scan(
            (None, None, None),
            |slots: &mut (Option<A>, Option<B>, Option<C>), item| {
                match item {
                    Latest::First(a) => slots.0 = Some(a),
                    Latest::Second(b) => slots.1 = Some(b),
                    Latest::Third(c) => slots.2 = Some(c),
                }
                let combined = match slots {
                    (Some(a), Some(b), Some(c)) => Some((a.clone(), b.clone(), c.clone())),
                    _ => None,
                };
                future::ready(Some(combined))
            },
        )
        .filter_map(future::ready)
        .boxed()
}
