use std::ops::Bound;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use keel::{
    BatchOp, CustomCodec, DbConfig, Entry, Format, IteratorOptions, KeelDb, KeelError,
    KeelResult, KeelValue, KvOp, KvScan, KvStore, MemKvStore, SeekOptions, WriteOptions,
};
use pretty_assertions::assert_eq;
use tokio::sync::oneshot;

#[ctor::ctor]
fn init() {
    dev_utils::setup_test_log();
}

async fn open_with(ops: Vec<BatchOp>) -> KeelDb {
    let db = KeelDb::open(DbConfig::default()).await.unwrap();
    db.batch(ops, WriteOptions::default()).await.unwrap();
    db
}

async fn one_two_three() -> KeelDb {
    open_with(vec![
        BatchOp::put("one", "1"),
        BatchOp::put("two", "2"),
        BatchOp::put("three", "3"),
    ])
    .await
}

async fn digits() -> KeelDb {
    open_with(
        (0..10)
            .map(|i| BatchOp::put(i.to_string(), i.to_string()))
            .collect(),
    )
    .await
}

fn text(v: &Option<KeelValue>) -> Option<String> {
    match v {
        Some(KeelValue::Binary(b)) => Some(String::from_utf8_lossy(b).into_owned()),
        Some(KeelValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn pair(entry: &Option<Entry>) -> Option<(String, String)> {
    entry
        .as_ref()
        .map(|e| (text(&e.key).unwrap(), text(&e.value).unwrap()))
}

fn kv(k: &str, v: &str) -> Option<(String, String)> {
    Some((k.to_owned(), v.to_owned()))
}

#[tokio::test]
async fn seek_throws_if_next_has_not_completed() {
    let db = KeelDb::open(DbConfig::default()).await.unwrap();
    let cursor = db.iterator(IteratorOptions::default());
    let step = cursor.next().unwrap();

    let err = cursor.seek("two", SeekOptions::default()).unwrap_err();
    assert_eq!(err.code(), "LEVEL_ITERATOR_BUSY");
    let err = cursor.next().err().unwrap();
    assert_eq!(err, KeelError::IteratorBusy);

    // the first step still completes normally
    assert_eq!(step.await.unwrap(), None);
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn seek_does_not_throw_after_close() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::default());
    cursor.close().await.unwrap();
    cursor.seek("two", SeekOptions::default()).unwrap();
    cursor.seek(KeelValue::Null, SeekOptions::default()).unwrap();
    assert!(cursor.is_closed());
    let err = cursor.next().unwrap().await.unwrap_err();
    assert_eq!(err, KeelError::IteratorClosed);
}

#[tokio::test]
async fn close_twice_is_fine() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::default());
    let first = cursor.close();
    let second = cursor.close();
    first.await.unwrap();
    second.await.unwrap();
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn close_during_step_discards_it() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::default());
    let step = cursor.next().unwrap();
    cursor.close().await.unwrap();
    assert_eq!(step.await.unwrap_err(), KeelError::IteratorClosed);
    assert_eq!(
        cursor.next().unwrap().await.unwrap_err(),
        KeelError::IteratorClosed
    );
}

#[tokio::test]
async fn seek_to_string_target() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::default());
    cursor.seek("two", SeekOptions::default()).unwrap();
    assert_eq!(pair(&cursor.next().unwrap().await.unwrap()), kv("two", "2"));
    assert_eq!(cursor.next().unwrap().await.unwrap(), None);
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn seek_to_buffer_target() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::new().key_encoding("buffer"));
    cursor
        .seek(Bytes::from_static(b"two"), SeekOptions::default())
        .unwrap();
    let entry = cursor.next().unwrap().await.unwrap();
    assert_eq!(pair(&entry), kv("two", "2"));
    assert_eq!(
        entry.unwrap().key,
        Some(KeelValue::Binary(Bytes::from_static(b"two")))
    );
    assert_eq!(cursor.next().unwrap().await.unwrap(), None);
}

#[tokio::test]
async fn seek_to_target_with_custom_encoding() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::default());
    let key_encoding = CustomCodec::new(Format::Utf8, |_| Ok("two".into()));
    cursor
        .seek("xyz", SeekOptions::new().key_encoding(key_encoding))
        .unwrap();
    assert_eq!(pair(&cursor.next().unwrap().await.unwrap()), kv("two", "2"));
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn seek_on_reverse_iterator() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::new().reverse(true).limit(1));
    cursor.seek("three!", SeekOptions::default()).unwrap();
    assert_eq!(
        pair(&cursor.next().unwrap().await.unwrap()),
        kv("three", "3")
    );
    assert_eq!(cursor.next().unwrap().await.unwrap(), None);
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn seek_to_out_of_range_target() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::default());
    cursor.seek("zzz", SeekOptions::default()).unwrap();
    assert_eq!(cursor.next().unwrap().await.unwrap(), None);
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn seek_on_reverse_iterator_to_out_of_range_target() {
    let db = one_two_three().await;
    let cursor = db.iterator(IteratorOptions::new().reverse(true));
    cursor.seek("zzz", SeekOptions::default()).unwrap();
    assert_eq!(pair(&cursor.next().unwrap().await.unwrap()), kv("two", "2"));
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn seek_respects_range() {
    let db = digits().await;
    let o = IteratorOptions::new;
    let cases: Vec<(IteratorOptions, &str, Option<&str>)> = vec![
        (o().gt("5"), "4", None),
        (o().gt("5"), "5", None),
        (o().gt("5"), "6", Some("6")),
        (o().gte("5"), "4", None),
        (o().gte("5"), "5", Some("5")),
        (o().gte("5"), "6", Some("6")),
        (o().lt("5"), "4", Some("4")),
        (o().lt("5"), "5", None),
        (o().lt("5"), "6", None),
        (o().lte("5"), "4", Some("4")),
        (o().lte("5"), "5", Some("5")),
        (o().lte("5"), "6", None),
        (o().lt("5").reverse(true), "4", Some("4")),
        (o().lt("5").reverse(true), "5", None),
        (o().lt("5").reverse(true), "6", None),
        (o().lte("5").reverse(true), "4", Some("4")),
        (o().lte("5").reverse(true), "5", Some("5")),
        (o().lte("5").reverse(true), "6", None),
        (o().gt("5").reverse(true), "4", None),
        (o().gt("5").reverse(true), "5", None),
        (o().gt("5").reverse(true), "6", Some("6")),
        (o().gte("5").reverse(true), "4", None),
        (o().gte("5").reverse(true), "5", Some("5")),
        (o().gte("5").reverse(true), "6", Some("6")),
        (o().gt("7").lt("8"), "7", None),
        (o().gte("7").lt("8"), "7", Some("7")),
        (o().gte("7").lt("8"), "8", None),
        (o().gt("7").lte("8"), "8", Some("8")),
    ];

    for (range, target, expected) in cases {
        let msg = format!("seek({}) on {:?} yields {:?}", target, range, expected);
        let cursor = db.iterator(range);
        cursor.seek(target, SeekOptions::default()).unwrap();
        let entry = cursor.next().unwrap().await.unwrap();
        assert_eq!(
            entry.as_ref().and_then(|e| text(&e.value)),
            expected.map(str::to_owned),
            "{}",
            msg
        );
        cursor.close().await.unwrap();
    }
}

#[tokio::test]
async fn seek_then_continue_in_range() {
    let db = digits().await;
    let cursor = db.iterator(IteratorOptions::new().gte("2").lt("6"));
    cursor.seek("3", SeekOptions::default()).unwrap();
    let rest: Vec<_> = cursor
        .all()
        .await
        .unwrap()
        .iter()
        .map(|e| text(&e.key).unwrap())
        .collect();
    assert_eq!(rest, ["3", "4", "5"]);
}

#[tokio::test]
async fn inverted_range_is_empty() {
    let db = digits().await;
    let cursor = db.iterator(IteratorOptions::new().gt("8").lt("2"));
    assert_eq!(cursor.next().unwrap().await.unwrap(), None);
    let cursor = db.iterator(IteratorOptions::new().gt("8").lt("2").reverse(true));
    assert_eq!(cursor.next().unwrap().await.unwrap(), None);
}

#[tokio::test]
async fn forward_and_reverse_are_symmetric() {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut ops = Vec::new();
    for _ in 0..200 {
        let len = rng.gen_range(1..4);
        let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..b'h')).collect();
        ops.push(BatchOp::put(key.clone(), key));
    }
    let db = open_with(ops).await;

    for _ in 0..50 {
        let a: Vec<u8> = vec![rng.gen_range(b'a'..b'h')];
        let b: Vec<u8> = vec![rng.gen_range(b'a'..b'h'), rng.gen_range(b'a'..b'h')];
        let mut options = IteratorOptions::new();
        options = if rng.gen() {
            options.gt(a.clone())
        } else {
            options.gte(a.clone())
        };
        options = if rng.gen() {
            options.lt(b.clone())
        } else {
            options.lte(b.clone())
        };

        let forward = db.iterator(options.clone()).all().await.unwrap();
        let mut reverse = db.iterator(options.reverse(true)).all().await.unwrap();
        reverse.reverse();
        assert_eq!(forward, reverse);

        let keys: Vec<_> = forward
            .iter()
            .map(|e| e.key.clone().unwrap().into_binary().unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);
    }
}

#[tokio::test]
async fn writes_are_visible_to_later_steps() {
    let db = digits().await;
    let cursor = db.iterator(IteratorOptions::new().gte("9"));
    db.put("9a", "x", WriteOptions::default()).await.unwrap();
    let keys: Vec<_> = cursor
        .all()
        .await
        .unwrap()
        .iter()
        .map(|e| text(&e.key).unwrap())
        .collect();
    assert_eq!(keys, ["9", "9a"]);
}

#[tokio::test]
async fn cursor_of_closed_db_fails() {
    let db = digits().await;
    let cursor = db.iterator(IteratorOptions::default());
    db.close().await.unwrap();
    let err = cursor.next().unwrap().await.unwrap_err();
    assert_eq!(err, KeelError::DatabaseNotOpen);
}

#[tokio::test]
async fn callback_and_future_agree() {
    let db = digits().await;
    let cursor = db.iterator(IteratorOptions::new().lt("1"));
    let (tx, rx) = oneshot::channel();
    cursor
        .next_with_callback(move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
    // still busy until the callback has run
    assert!(cursor.next_with_callback(|_| {}).is_err());
    assert_eq!(pair(&rx.await.unwrap().unwrap()), kv("0", "0"));

    let (tx, rx) = oneshot::channel();
    cursor.close_with_callback(move |r| {
        let _ = tx.send(r);
    });
    rx.await.unwrap().unwrap();

    let (tx, rx) = oneshot::channel();
    cursor
        .next_with_callback(move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
    let from_callback = rx.await.unwrap().unwrap_err();
    let from_future = cursor.next().unwrap().await.unwrap_err();
    assert_eq!(from_callback, from_future);
    assert_eq!(from_callback.code(), "LEVEL_ITERATOR_NOT_OPEN");
}

#[derive(Debug)]
struct BrokenStore {
    inner: MemKvStore,
}

impl KvStore for BrokenStore {
    fn get(&self, _key: &[u8]) -> KeelResult<Option<Bytes>> {
        Err(KeelError::backend("disk on fire"))
    }

    fn set(&mut self, key: &[u8], value: Bytes) -> KeelResult<()> {
        self.inner.set(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> KeelResult<()> {
        self.inner.remove(key);
        Ok(())
    }

    fn apply(&mut self, ops: Vec<KvOp>) -> KeelResult<()> {
        self.inner.apply(ops);
        Ok(())
    }

    fn scan(&self, _start: Bound<&[u8]>, _end: Bound<&[u8]>) -> KeelResult<KvScan<'_>> {
        Err(KeelError::backend("disk on fire"))
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }
}

#[tokio::test]
async fn backend_errors_pass_through() {
    let store = Arc::new(Mutex::new(BrokenStore {
        inner: MemKvStore::new(),
    }));
    let db = KeelDb::open_with_store(DbConfig::default(), store)
        .await
        .unwrap();
    db.put("a", "1", WriteOptions::default()).await.unwrap();

    let err = db
        .get("a", keel::ReadOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LEVEL_BACKEND_ERROR");

    let cursor = db.iterator(IteratorOptions::default());
    let err = cursor.next().unwrap().await.unwrap_err();
    assert_eq!(err, KeelError::backend("disk on fire"));
    // the cursor is still usable after a backend failure
    assert!(cursor.next().is_ok());
}

#[tokio::test]
async fn inverted_range_skips_the_backend() {
    let store = Arc::new(Mutex::new(BrokenStore {
        inner: MemKvStore::new(),
    }));
    let db = KeelDb::open_with_store(DbConfig::default(), store)
        .await
        .unwrap();

    for options in [
        IteratorOptions::new().gt("8").lt("2"),
        IteratorOptions::new().gte("5").lt("5").reverse(true),
    ] {
        let cursor = db.iterator(options);
        assert_eq!(cursor.next().unwrap().await.unwrap(), None);
    }

    let cursor = db.iterator(IteratorOptions::new().gte("5").lte("5"));
    let err = cursor.next().unwrap().await.unwrap_err();
    assert_eq!(err.code(), "LEVEL_BACKEND_ERROR");
}
