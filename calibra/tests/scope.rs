use calibra::{CalibraError, IndexMapper, Scope, Variable};

fn abc() -> Scope {
    Scope::new(vec![
        Variable::discrete("C", 2),
        Variable::discrete("A", 3),
        Variable::discrete("B", 4),
    ])
}

#[test]
fn canonical_order() {
    let s = abc();
    assert_eq!(s.ids().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    assert_eq!(s.cardinalities(), &[3, 4, 2]);
    assert_eq!(s.coder().strides(), &[1, 3, 12]);
    assert_eq!(s.num_distinct_values(), 24);
}

#[test]
fn duplicates_keep_first() {
    let s = Scope::new(vec![Variable::discrete("A", 2), Variable::discrete("A", 5)]);
    assert_eq!(s.len(), 1);
    assert_eq!(s.cardinalities(), &[2]);
}

#[test]
fn encode_decode() {
    let coder = abc().coder().clone();
    for i in 0..coder.size() {
        assert_eq!(coder.encode(&coder.decode(i)), i);
    }
    assert_eq!(coder.decode(5), vec![2, 1, 0]);
    assert!(coder.checked_encode(&[3, 0, 0]).is_err());
}

#[test]
fn projected_indexes() {
    let coder = abc().coder().clone();
    let idx = coder
        .indexes_for_projected_assignment(&[0, 2, 1], &[false, true, true])
        .unwrap();
    assert_eq!(idx, vec![18, 19, 20]);
    let idx = coder
        .indexes_for_projected_assignment(&[1, 0, 0], &[true, false, false])
        .unwrap();
    assert_eq!(idx.len(), 8);
    assert!(idx.iter().all(|i| coder.decode(*i)[0] == 1));
}

#[test]
fn mapping() {
    let s = abc();
    let other = Scope::new(vec![Variable::discrete("C", 2), Variable::discrete("D", 2)]);
    assert_eq!(s.create_mapping(&other), vec![None, None, Some(0)]);
    assert_eq!(other.create_mapping(&s), vec![Some(2), None]);
}

#[test]
fn compatibility_of_shared_ids() {
    let s = abc();
    let same = Scope::new(vec![Variable::discrete("A", 3), Variable::discrete("Z", 7)]);
    assert!(s.check_compatible(&same).is_ok());
    let resized = Scope::new(vec![Variable::discrete("B", 2)]);
    assert!(matches!(
        s.check_compatible(&resized),
        Err(CalibraError::ScopeMismatch { .. })
    ));
    let continuous = Scope::new(vec![Variable::continuous("C")]);
    assert!(continuous.check_compatible(&s).is_err());
}

#[test]
fn index_mapper_reorders() {
    let s = Scope::new(vec![Variable::discrete("A", 2), Variable::discrete("B", 3)]);
    let foreign = [Variable::discrete("B", 3), Variable::discrete("A", 2)];
    let mapper = IndexMapper::new(&foreign, &s).unwrap();
    // foreign index 1 is (B=1, A=0), canonical (A=0, B=1) is 2
    assert_eq!(mapper.map(1), 2);
    let values: Vec<f64> = (0..6).map(|x| x as f64).collect();
    let canonical = mapper.map_values(&values).unwrap();
    assert_eq!(mapper.unmap_values(&canonical).unwrap(), values);
}
