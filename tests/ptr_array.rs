use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use arc_array::{ArcPtrArray, FreeFunc, PtrArray, Removal};
use proptest::prelude::*;

fn recording() -> (FreeFunc<String>, Arc<Mutex<Vec<String>>>) {
    let freed = Arc::new(Mutex::new(Vec::new()));
    let recorder = freed.clone();
    let free_func: FreeFunc<String> = Arc::new(move |s: String| recorder.lock().unwrap().push(s));
    (free_func, freed)
}

fn strings(items: &[Option<&str>]) -> Vec<Option<String>> {
    items.iter().map(|s| s.map(String::from)).collect()
}

#[test]
fn null_terminated_lifecycle() {
    let (free_func, freed) = recording();
    let mut array = PtrArray::new_null_terminated(0, Some(free_func), true);
    assert_eq!(array.as_terminated_slice(), None);
    for s in ["c", "a", "b"] {
        array.add(Some(s.to_owned()));
    }
    array.insert(Some(1), None);
    assert_eq!(
        array.as_terminated_slice().unwrap(),
        &strings(&[Some("c"), None, Some("a"), Some("b"), None])[..]
    );
    array.sort_values(|a, b| a.cmp(&b));
    assert_eq!(array.as_slice(), &strings(&[None, Some("a"), Some("b"), Some("c")])[..]);
    assert!(array.remove(&"b".to_owned()));
    assert!(!array.remove(&"z".to_owned()));
    assert_eq!(array.steal_index(0, Removal::Swap), None);
    assert_eq!(array.as_slice(), &strings(&[Some("c"), Some("a")])[..]);
    drop(array);
    assert_eq!(*freed.lock().unwrap(), ["b", "c", "a"]);
}

#[test]
fn extend_copies_with_copy_func() {
    let mut array = PtrArray::new_from_slice(&strings(&[Some("x"), None]), Clone::clone, None);
    let other = PtrArray::new_from_null_terminated(
        &strings(&[Some("y"), Some("z"), None, Some("ignored")]),
        |s: &String| s.to_uppercase(),
        None,
    );
    assert_eq!(other.len(), 2);
    assert!(other.is_null_terminated());
    array.extend(&other, |s| format!("{s}!"));
    assert_eq!(
        array.as_slice(),
        &strings(&[Some("x"), None, Some("Y!"), Some("Z!")])[..]
    );
    assert_eq!(array.find(&"Y!".to_owned()), Some(2));
    let index = array.find_with_equal_func("z!", |a: Option<&String>, b: &str| {
        a.is_some_and(|a| a.eq_ignore_ascii_case(b))
    });
    assert_eq!(index, Some(3));
}

#[test]
fn shared_free_keeps_wrapper() {
    let (free_func, freed) = recording();
    let array = ArcPtrArray::new(PtrArray::new_full(0, Some(free_func)));
    array.borrow_mut().add(Some("one".to_owned()));
    let other = array.clone();
    // another holder remains: elements are freed, the container survives empty
    assert_eq!(array.free(true), None);
    assert_eq!(*freed.lock().unwrap(), ["one"]);
    assert!(other.borrow().is_empty());
    assert_eq!(other.ref_count(), 1);
    other.borrow_mut().add(Some("two".to_owned()));
    let stolen = other.free(false).unwrap();
    assert_eq!(stolen, strings(&[Some("two")]));
    assert_eq!(*freed.lock().unwrap(), ["one"]);
}

#[derive(Debug, Clone)]
enum Op {
    Add(Option<u32>),
    Insert(usize, Option<u32>),
    RemoveIndex(usize, Removal),
    StealIndex(usize, Removal),
    RemoveRange(usize, usize),
    SetSize(usize),
    Steal,
}

fn arb_removal() -> impl Strategy<Value = Removal> {
    prop_oneof![Just(Removal::Preserve), Just(Removal::Swap)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<Option<u32>>().prop_map(Op::Add),
        2 => (0..32usize, any::<Option<u32>>()).prop_map(|(i, v)| Op::Insert(i, v)),
        2 => (0..32usize, arb_removal()).prop_map(|(i, r)| Op::RemoveIndex(i, r)),
        1 => (0..32usize, arb_removal()).prop_map(|(i, r)| Op::StealIndex(i, r)),
        1 => (0..32usize, 0..6usize).prop_map(|(i, n)| Op::RemoveRange(i, n)),
        1 => (0..32usize).prop_map(Op::SetSize),
        1 => Just(Op::Steal),
    ]
}

struct Model {
    items: Vec<Option<u32>>,
    allocated: bool,
    freed: usize,
}

impl Model {
    fn free(&mut self, items: impl IntoIterator<Item = Option<u32>>) {
        self.freed += items.into_iter().flatten().count();
    }
}

fn apply(array: &mut PtrArray<u32>, model: &mut Model, null_terminated: bool, op: Op) {
    match op {
        Op::Add(item) => {
            array.add(item);
            model.items.push(item);
            model.allocated = true;
        }
        Op::Insert(index, item) => {
            let index = index.min(model.items.len());
            array.insert(Some(index), item);
            model.items.insert(index, item);
            model.allocated = true;
        }
        Op::RemoveIndex(index, _) | Op::StealIndex(index, _)
            if index >= model.items.len() => {}
        Op::RemoveIndex(index, removal) => {
            array.remove_index(index, removal);
            let item = match removal {
                Removal::Preserve => model.items.remove(index),
                Removal::Swap => model.items.swap_remove(index),
            };
            model.free([item]);
        }
        Op::StealIndex(index, removal) => {
            let expected = match removal {
                Removal::Preserve => model.items.remove(index),
                Removal::Swap => model.items.swap_remove(index),
            };
            assert_eq!(array.steal_index(index, removal), expected);
        }
        Op::RemoveRange(index, count) => {
            let index = index.min(model.items.len());
            let count = count.min(model.items.len() - index);
            array.remove_range(index, count);
            let removed: Vec<_> = model.items.drain(index..index + count).collect();
            model.free(removed);
        }
        Op::SetSize(len) => {
            array.set_size(len);
            if len > model.items.len() {
                model.allocated = true;
            }
            let removed: Vec<_> = model.items.drain(len.min(model.items.len())..).collect();
            model.free(removed);
            model.items.resize(len, None);
        }
        Op::Steal => {
            let mut expected = std::mem::take(&mut model.items);
            if null_terminated && model.allocated {
                expected.push(None);
            }
            assert_eq!(array.steal(), expected);
            model.allocated = false;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn ptr_array_matches_vec_model(
        null_terminated in any::<bool>(),
        reserved in 0..4usize,
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let freed = Arc::new(AtomicUsize::new(0));
        let counter = freed.clone();
        let free_func: FreeFunc<u32> = Arc::new(move |_: u32| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let mut array = PtrArray::new_null_terminated(reserved, Some(free_func), null_terminated);
        let mut model = Model {
            items: Vec::new(),
            allocated: reserved != 0,
            freed: 0,
        };
        for op in ops {
            apply(&mut array, &mut model, null_terminated, op);
            prop_assert_eq!(array.as_slice(), &model.items[..]);
            prop_assert_eq!(freed.load(Ordering::Relaxed), model.freed);
            let terminated = array.as_terminated_slice();
            if null_terminated && model.allocated {
                let (last, items) = terminated.unwrap().split_last().unwrap();
                prop_assert_eq!(items, &model.items[..]);
                prop_assert_eq!(last, &None);
            } else {
                prop_assert_eq!(terminated, None);
            }
        }
    }
}

fn some_strings(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|s| Some(String::from(*s))).collect()
}

#[test]
fn null_termination_is_tracked() {
    let mut array = PtrArray::<u32>::new_null_terminated(0, None, true);
    assert_eq!(array.capacity(), 0);
    assert_eq!(array.as_terminated_slice(), None);
    array.add(Some(1));
    array.add(None);
    assert_eq!(array.len(), 2);
    assert_eq!(array.as_terminated_slice(), Some(&[Some(1), None, None][..]));
    array.insert(Some(0), Some(0));
    array.set_size(5);
    assert_eq!(array.as_slice(), [Some(0), Some(1), None, None, None]);
    assert_eq!(array.as_terminated_slice().unwrap().len(), 6);

    let mut plain = PtrArray::new();
    plain.add(Some(1u32));
    plain.add(None);
    assert!(!plain.is_null_terminated());
    assert_eq!(plain.as_terminated_slice(), None);
}

#[test]
fn removal_discards_and_steal_returns() {
    let (free_func, freed) = recording();
    let mut array = PtrArray::new_take(some_strings(&["a", "b", "c", "d"]), Some(free_func));
    array.remove_index(0, Removal::Swap);
    assert_eq!(*freed.lock().unwrap(), ["a"]);
    assert_eq!(array.steal_index(0, Removal::Preserve).as_deref(), Some("d"));
    assert_eq!(freed.lock().unwrap().len(), 1);
    assert!(array.remove(&String::from("c")));
    assert!(!array.remove(&String::from("z")));
    assert_eq!(*freed.lock().unwrap(), ["a", "c"]);
    drop(array);
    assert_eq!(*freed.lock().unwrap(), ["a", "c", "b"]);
}

#[test]
fn set_size_discards_in_order() {
    let (free_func, freed) = recording();
    let mut array = PtrArray::new_full(4, Some(free_func));
    for s in ["0", "1", "2", "3", "4", "5", "6"] {
        array.add(Some(String::from(s)));
    }
    array.set_size(3);
    assert_eq!(*freed.lock().unwrap(), ["3", "4", "5", "6"]);
    assert_eq!(array.len(), 3);
}

#[test]
fn extend_and_steal_moves_without_freeing() {
    let (free_func, freed) = recording();
    let mut array = PtrArray::new_null_terminated(0, Some(free_func.clone()), true);
    array.add(Some(String::from("a")));
    let other = PtrArray::new_take_null_terminated(
        vec![Some(String::from("b")), Some(String::from("c")), None],
        Some(free_func),
    );
    array.extend(&other, |s| s.to_uppercase());
    array.extend_and_steal(other);
    assert!(freed.lock().unwrap().is_empty());
    assert_eq!(
        array.as_terminated_slice().unwrap(),
        [some_strings(&["a", "B", "C", "b", "c"]), vec![None]].concat()
    );
}

#[test]
fn copy_shares_free_func() {
    let (free_func, freed) = recording();
    let array = PtrArray::new_from_slice(&some_strings(&["x", "y"]), String::clone, Some(free_func));
    let copy = array.copy(|s| s.repeat(2));
    assert!(copy.has_free_func());
    drop(copy);
    assert_eq!(*freed.lock().unwrap(), ["xx", "yy"]);
    assert_eq!(array.clone(), array);

    let empty = PtrArray::<String>::new_null_terminated(0, None, true);
    assert_eq!(empty.copy(String::clone).capacity(), 0);
}

#[test]
fn sort_receives_slots() {
    let mut array: PtrArray<u32> = [Some(3), None, Some(1), Some(3), Some(2)]
        .into_iter()
        .collect();
    array.sort(|a, b| a.cmp(b));
    assert_eq!(array.as_slice(), [None, Some(1), Some(2), Some(3), Some(3)]);
    array.sort_values(|a, b| b.cmp(&a));
    assert_eq!(array.as_slice(), [Some(3), Some(3), Some(2), Some(1), None]);
    assert_eq!(array.find(&2), Some(2));
    assert_eq!(array.find_with_equal_func(&0, |item, _| item.is_none()), Some(4));
    let mut total = 0;
    array.foreach(|item| total += item.copied().unwrap_or(0));
    assert_eq!(total, 9);
}

#[test]
fn free_returns_terminated_storage() {
    let array = PtrArray::<u32>::new_null_terminated(0, None, true);
    assert_eq!(array.free(false), Some(vec![None]));

    let mut array = PtrArray::new_null_terminated(0, None, true);
    array.add(Some(7u32));
    assert_eq!(array.free(false), Some(vec![Some(7), None]));

    let (free_func, freed) = recording();
    let array = PtrArray::new_take(some_strings(&["k"]), Some(free_func));
    assert_eq!(array.free(true), None);
    assert_eq!(*freed.lock().unwrap(), ["k"]);
}

#[test]
fn new_from_null_terminated_stops_at_none() {
    let array = PtrArray::new_from_null_terminated(&[Some(1u8), None, Some(2)], u8::clone, None);
    assert_eq!(array.as_terminated_slice(), Some(&[Some(1), None][..]));
    let array = PtrArray::new_from_null_terminated(&[], u8::clone, None);
    assert_eq!(array.capacity(), 0);
}

#[test]
#[should_panic = "out of range"]
fn insert_out_of_range() {
    let mut array = PtrArray::<u8>::new();
    array.insert(Some(1), None);
}
