use rpn_vm::prelude::*;

fn feed(creator: &mut ProgressiveTypeCreator, rows: &[&[&str]]) {
    for row in rows {
        for token in *row {
            creator.add_element(token).unwrap();
        }
        creator.end_vector().unwrap();
    }
}

#[test]
fn single_element_finishes_as_a_scalar() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::INT32).unwrap();
    creator.add_element("42").unwrap();
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Scalar);
    assert_eq!(object.scalar::<i32>().unwrap(), 42);
}

#[test]
fn a_row_of_elements_finishes_as_a_vector() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::FLOAT64).unwrap();
    for token in ["1.5", "2.5", "3.5"] {
        creator.add_element(token).unwrap();
    }
    creator.end_vector().unwrap();
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Vector(3));
    assert_eq!(object.row::<f64>(0).unwrap(), [1.5, 2.5, 3.5]);
}

#[test]
fn two_equal_rows_are_a_2x3_matrix() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::INT32).unwrap();
    feed(&mut creator, &[&["1", "2", "3"], &["4", "5", "6"]]);
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Matrix { rows: 2, cols: 3 });
    assert_eq!(object.row::<i32>(0).unwrap(), [1, 2, 3]);
    assert_eq!(object.row::<i32>(1).unwrap(), [4, 5, 6]);
}

#[test]
fn a_short_row_turns_the_matrix_sparse() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::INT32).unwrap();
    feed(&mut creator, &[&["1", "2", "3"], &["4", "5"]]);
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Sparse(vec![3, 2]));
    assert_eq!(object.len(), 5);
    assert_eq!(object.row::<i32>(0).unwrap(), [1, 2, 3]);
    assert_eq!(object.row::<i32>(1).unwrap(), [4, 5]);
    assert!(object.element::<i32>(1, 2).is_err());
}

#[test]
fn a_long_row_turns_the_matrix_sparse() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::UINT8).unwrap();
    feed(&mut creator, &[&["1", "2"], &["3", "4", "5"]]);
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Sparse(vec![2, 3]));
    assert_eq!(object.row::<u8>(1).unwrap(), [3, 4, 5]);
}

#[test]
fn sparse_element_count_matches_the_size_stack() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::INT16).unwrap();
    feed(&mut creator, &[&["1"], &["2", "3", "4"], &["5", "6"]]);
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    let Shape::Sparse(sizes) = object.shape() else {
        panic!("expected a sparse shape");
    };
    assert_eq!(sizes.iter().sum::<usize>(), object.len());
    assert_eq!(sizes, &vec![1, 3, 2]);
}

#[test]
fn matrices_span_pages_without_splitting_rows() {
    // room for exactly one 2-element int32 row per page
    let mut creator = ProgressiveTypeCreator::new(8);
    creator.start(TypeDescriptor::INT32).unwrap();
    feed(&mut creator, &[&["1", "2"], &["3", "4"], &["5", "6"]]);
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Matrix { rows: 3, cols: 2 });
    assert_eq!(object.row::<i32>(0).unwrap(), [1, 2]);
    assert_eq!(object.row::<i32>(1).unwrap(), [3, 4]);
    assert_eq!(object.row::<i32>(2).unwrap(), [5, 6]);
}

#[test]
fn a_vector_grows_its_page_in_place() {
    let mut creator = ProgressiveTypeCreator::new(8);
    creator.start(TypeDescriptor::INT32).unwrap();
    for value in 1..=5 {
        creator.add_element(&value.to_string()).unwrap();
    }
    creator.end_vector().unwrap();
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Vector(5));
    assert_eq!(object.row::<i32>(0).unwrap(), [1, 2, 3, 4, 5]);
}

#[test]
fn string_elements_build_a_matrix_with_an_index() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::DYNAMIC_STRING).unwrap();
    feed(
        &mut creator,
        &[&["alpha", "beta"], &["gamma", "delta"]],
    );
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(*object.shape(), Shape::Matrix { rows: 2, cols: 2 });
    assert_eq!(object.string_element(0, 0).unwrap(), "alpha");
    assert_eq!(object.string_element(0, 1).unwrap(), "beta");
    assert_eq!(object.string_element(1, 0).unwrap(), "gamma");
    assert_eq!(object.string_element(1, 1).unwrap(), "delta");
    assert!(object.element::<i32>(0, 0).is_err());
}

#[test]
fn unparsable_elements_poison_the_builder() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    creator.start(TypeDescriptor::INT32).unwrap();
    creator.add_element("1").unwrap();
    assert!(creator.add_element("not-a-number").is_err());

    // every later call fails until the builder is reset
    assert!(creator.add_element("2").is_err());
    assert!(creator.end_vector().is_err());
    assert!(creator.end().is_err());

    creator.start(TypeDescriptor::INT32).unwrap();
    creator.add_element("7").unwrap();
    creator.end().unwrap();
    assert_eq!(creator.get_reference().unwrap().scalar::<i32>().unwrap(), 7);
}

#[test]
fn lifecycle_guards() {
    let mut creator = ProgressiveTypeCreator::new(1024);

    // nothing built yet
    assert!(creator.get_reference().is_err());
    assert!(creator.end().is_err());

    creator.clean();
    creator.start(TypeDescriptor::UINT64).unwrap();
    assert!(creator.get_reference().is_err());
    creator.add_element("9").unwrap();
    creator.end().unwrap();

    let object = creator.get_reference().unwrap();
    assert_eq!(object.scalar::<u64>().unwrap(), 9);

    // handing the object over resets the builder
    creator.start(TypeDescriptor::UINT64).unwrap();
    creator.add_element("10").unwrap();
    creator.end().unwrap();
    assert_eq!(
        creator.get_reference().unwrap().scalar::<u64>().unwrap(),
        10
    );
}

#[test]
fn non_aggregatable_types_are_rejected() {
    let mut creator = ProgressiveTypeCreator::new(1024);
    let err = creator.start(TypeDescriptor::INVALID).unwrap_err();
    assert!(err.flags().contains(Flags::UNSUPPORTED_FEATURE));
}

#[test]
fn default_page_size_is_reported() {
    let creator = ProgressiveTypeCreator::new(2048);
    assert_eq!(creator.default_page_size(), 2048);
    assert_eq!(
        ProgressiveTypeCreator::default().default_page_size(),
        rpn_vm::consts::DEFAULT_PAGE_SIZE
    );
}
