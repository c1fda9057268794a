use super::*;

#[test]
fn slots_stay_valid_after_later_declarations() {
    let mut store = VarStore::new();
    let a = store.declare_global("$a", VarShape::Scalar, false).unwrap();
    let slot = store.info(a).slot(0);
    store.set(slot, 3.0);

    for i in 0..100 {
        store.declare_local(&format!("$l{i}"), VarShape::Array(4), SectionId(0));
    }

    assert_eq!(store.get(slot), 3.0);
    assert_eq!(store.value(a), &[3.0]);
}

#[test]
fn duplicate_globals_are_rejected() {
    let mut store = VarStore::new();
    assert!(store.declare_global("$a", VarShape::Scalar, false).is_some());
    assert!(store.declare_global("$a", VarShape::Scalar, false).is_none());
}

#[test]
fn ranges_are_clamped_to_the_declared_extent() {
    let mut store = VarStore::new();
    let arr = store.declare_global("$arr", VarShape::Array(4), false).unwrap();
    let r = store.range(arr, 2, 10);
    assert_eq!(r.len, 2);
    store.set_range(r, [1.0, 2.0, 3.0]);
    assert_eq!(store.value(arr), &[0.0, 0.0, 1.0, 2.0]);

    let r = store.range(arr, 9, 1);
    assert_eq!(r.start, store.info(arr).slot(3));
}

#[test]
fn only_changed_persisted_globals_are_dirty() {
    let mut store = VarStore::new();
    let p = store.declare_global("$p", VarShape::Scalar, true).unwrap();
    let q = store.declare_global("$q", VarShape::Scalar, false).unwrap();
    store.set(store.info(p).slot(0), 0.0);
    store.set(store.info(q).slot(0), 1.0);
    assert!(store.take_dirty().is_empty());

    store.set(store.info(p).slot(0), 2.0);
    assert_eq!(store.take_dirty(), vec![p]);
    assert!(store.take_dirty().is_empty());
}

#[test]
fn ini_params_parse_and_grow() {
    assert_eq!(parse_ini_param("x"), Some((0, 0)));
    assert_eq!(parse_ini_param("w12"), Some((12, 3)));
    assert_eq!(parse_ini_param("x1a"), None);
    assert_eq!(parse_ini_param("time"), None);

    let mut params = IniParams::new(2, 16);
    assert!(params.ensure(10).is_ok());
    assert_eq!(params.count(), 11);
    assert!(params.ensure(16).is_err());

    params.set(flat_param(10, 2), 0.5);
    assert_eq!(params.vec4(10), [0.0, 0.0, 0.5, 0.0]);
}
