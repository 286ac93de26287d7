// Unit tests for domain models

use std::sync::Arc;

use super::*;
use crate::domain::errors::DomainError;

fn create_model() -> AlignmentModel {
    AlignmentModel::new(
        Arc::new(f64::sin),
        Arc::new(f64::sin),
        Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0).fixed(),
        Parameter::new("qry_begin").with_value(0.0).with_bounds(0.0, 3.14),
        Parameter::new("qry_end").with_value(3.14).with_bounds(0.0, 5.0),
        None,
    )
    .unwrap()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

#[test]
fn test_parameter_within_bounds() {
    let p = Parameter::new("p").with_value(0.5).with_bounds(0.0, 1.0);
    assert!(p.is_within_bounds().unwrap());

    let p = Parameter::new("p").with_value(1.5).with_bounds(0.0, 1.0);
    assert!(!p.is_within_bounds().unwrap());
}

#[test]
fn test_parameter_within_bounds_requires_values() {
    assert!(Parameter::new("p").with_bounds(0.0, 1.0).is_within_bounds().is_err());
    assert!(Parameter::new("p").with_value(0.5).is_within_bounds().is_err());
    assert!(Parameter::new("p")
        .with_value(f64::NAN)
        .with_bounds(0.0, 1.0)
        .is_within_bounds()
        .is_err());
}

#[test]
fn test_parameter_project() {
    let p = Parameter::new("p").with_bounds(-1.0, 1.0);
    assert_eq!(p.project(3.0), 1.0);
    assert_eq!(p.project(-3.0), -1.0);
    assert_eq!(p.project(0.25), 0.25);
    assert_eq!(Parameter::new("free").project(42.0), 42.0);
}

#[test]
fn test_interval_type_parse() {
    assert_eq!(IntervalType::parse("constant").unwrap(), IntervalType::Constant);
    assert_eq!(IntervalType::parse("min-max").unwrap(), IntervalType::MinMax);
    assert_eq!(IntervalType::parse("RELATIVE").unwrap(), IntervalType::Relative);
    assert_eq!(IntervalType::parse("flexible").unwrap(), IntervalType::Flexible);
    assert!(IntervalType::parse("elastic").is_err());
}

#[test]
fn test_interval_ref_length_validation() {
    assert!(Interval::constant(0.0, 1.0).is_err());
    assert!(Interval::relative(-1.0, None).is_err());
    assert!(Interval::flexible(f64::NAN).is_err());

    let mut interval = Interval::flexible(0.5).unwrap();
    assert!(interval.set_ref_length(0.0).is_err());
    interval.set_ref_length(0.25).unwrap();
    assert_eq!(interval.ref_length(), 0.25);
}

#[test]
fn test_constant_interval_is_fixed() {
    let mut interval = Interval::constant(0.5, 2.0).unwrap();
    assert!(interval.trainable_params().is_empty());
    assert_eq!(interval.stored_length().unwrap(), 2.0);

    interval.set_length(3.0).unwrap();
    let p = interval.length_param().unwrap();
    assert_eq!(p.bounds(), (Some(3.0), Some(3.0)));
    assert!(interval.set_length(-1.0).is_err());
}

#[test]
fn test_min_max_interval_bounds() {
    let interval = Interval::min_max(0.5, 1.0, Some((0.5, 2.0))).unwrap();
    assert_eq!(interval.min_max_lengths(), Some((Some(0.5), Some(2.0))));
    assert_eq!(interval.trainable_params().len(), 1);

    assert!(Interval::min_max(0.5, 1.0, Some((2.0, 0.5))).is_err());
    assert!(Interval::min_max(0.5, 1.0, Some((1.0, 1.0))).is_err());
    assert!(Interval::min_max(0.5, 3.0, Some((0.5, 2.0))).is_err());
    assert!(Interval::min_max(0.5, 1.0, Some((f64::NAN, 2.0))).is_err());
}

#[test]
fn test_flexible_interval_rejects_length() {
    let mut interval = Interval::flexible(0.5).unwrap();
    assert!(interval.params().is_empty());
    assert!(matches!(
        interval.set_length(1.0),
        Err(DomainError::InvalidInterval(_))
    ));
}

#[test]
fn test_relative_interval_parameter() {
    let interval = Interval::relative(0.5, Some(2.0)).unwrap();
    let p = interval.length_param().unwrap();
    assert_eq!(p.name, "rel_len");
    assert!(p.is_trainable);
    assert_eq!(interval.rel_length(), Some(2.0));
    assert_eq!(Interval::relative(0.5, None).unwrap().rel_length(), Some(0.0));
}

#[test]
fn test_model_init() {
    let model = create_model();
    assert_eq!(model.qry_begin().name, "begin");
    assert_eq!(model.qry_end().name, "end");
    assert_eq!(model.ref_supp(), (0.0, 1.0));
    assert_eq!(model.qry_supp(), (0.0, 5.0));
    assert!(model.is_open_begin());
    assert!(model.is_open_end());
    assert_eq!(model.num_intervals(), 0);
}

#[test]
fn test_model_rejects_misconfigured_supports() {
    let f = || -> crate::signal::SharedSignal { Arc::new(f64::sin) };

    // begin lower bound beyond end upper bound
    assert!(AlignmentModel::new(
        f(),
        f(),
        Parameter::new("r").with_value(0.0).with_bounds(0.0, 1.0),
        Parameter::new("b").with_value(6.0).with_bounds(6.0, 7.0),
        Parameter::new("e").with_value(6.0).with_bounds(0.0, 5.0),
        None,
    )
    .is_err());

    // reference begin outside its bounds
    assert!(AlignmentModel::new(
        f(),
        f(),
        Parameter::new("r").with_value(2.0).with_bounds(0.0, 1.0),
        Parameter::new("b").with_value(0.0).with_bounds(0.0, 1.0),
        Parameter::new("e").with_value(1.0).with_bounds(0.0, 1.0),
        None,
    )
    .is_err());

    // reference begin without a value
    assert!(AlignmentModel::new(
        f(),
        f(),
        Parameter::new("r").with_bounds(0.0, 1.0),
        Parameter::new("b").with_value(0.0).with_bounds(0.0, 1.0),
        Parameter::new("e").with_value(1.0).with_bounds(0.0, 1.0),
        None,
    )
    .is_err());
}

#[test]
fn test_set_ref_supp_validation() {
    let mut model = create_model();
    assert!(model.set_ref_supp((1.0, 1.0)).is_err());
    assert!(model.set_ref_supp((f64::NAN, 1.0)).is_err());
    model.set_ref_supp((0.0, 2.0)).unwrap();
    assert_eq!(model.ref_supp(), (0.0, 2.0));
}

#[test]
fn test_add_interval_respects_reference_length() {
    let mut model = create_model();
    model.add_interval(Interval::relative(0.8, None).unwrap(), None).unwrap();
    let err = model
        .add_interval(Interval::relative(0.3, None).unwrap(), None)
        .unwrap_err();
    assert!(err.to_string().contains("exceed"));

    model.add_interval(Interval::relative(0.2, None).unwrap(), None).unwrap();
    assert_eq!(model.num_intervals(), 2);
}

#[test]
fn test_add_interval_single_flexible() {
    let mut model = create_model();
    model.add_interval(Interval::flexible(0.3).unwrap(), None).unwrap();
    assert!(model.has_flexible_interval());
    assert!(model.add_interval(Interval::flexible(0.3).unwrap(), None).is_err());
    assert!(model.add_interval(Interval::relative(0.3, None).unwrap(), None).is_err());
    model.add_interval(Interval::constant(0.3, 1.0).unwrap(), None).unwrap();
}

#[test]
fn test_add_interval_at_index() {
    let mut model = create_model();
    model.add_interval(Interval::constant(0.2, 1.0).unwrap(), None).unwrap();
    model.add_interval(Interval::constant(0.3, 1.0).unwrap(), Some(0)).unwrap();
    model.add_interval(Interval::constant(0.1, 1.0).unwrap(), Some(99)).unwrap();

    let refs: Vec<f64> = model.intervals(None).iter().map(|i| i.ref_length()).collect();
    assert_eq!(refs, vec![0.3, 0.2, 0.1]);
}

#[test]
fn test_reference_boundaries_and_lookup() {
    let mut model = create_model();
    model.add_interval(Interval::constant(0.25, 1.0).unwrap(), None).unwrap();
    model.add_interval(Interval::constant(0.25, 1.0).unwrap(), None).unwrap();
    model.add_interval(Interval::constant(0.5, 1.0).unwrap(), None).unwrap();

    assert_eq!(model.reference_boundaries(), vec![0.0, 0.25, 0.5, 1.0]);
    assert_eq!(model.interval_index_for(0.0).unwrap(), 0);
    assert_eq!(model.interval_index_for(0.25).unwrap(), 1);
    assert_eq!(model.interval_index_for(0.7).unwrap(), 2);
    assert_eq!(model.interval_index_for(1.0).unwrap(), 2);
    assert!(matches!(
        model.interval_index_for(1.5),
        Err(DomainError::OutOfRange(_))
    ));
}

#[test]
fn test_interval_lookup_requires_intervals() {
    assert!(create_model().interval_index_for(0.5).is_err());
}

#[test]
fn test_beta_without_gamma_d() {
    let mut model = create_model();
    assert_eq!(model.beta_l().unwrap(), 0.0);
    assert_eq!(model.beta_u().unwrap(), 3.14);

    model.set_trainable_values(&[4.0, 3.0]).unwrap();
    assert!(matches!(model.beta_l(), Err(DomainError::IllegalState(_))));
    assert!(model.beta_u().is_err());
}

#[test]
fn test_beta_with_gamma_d() {
    let mut model = AlignmentModel::new(
        Arc::new(f64::sin),
        Arc::new(f64::cos),
        Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0),
        Parameter::new("b").with_value(1.0).with_bounds(0.0, 4.0),
        Parameter::new("e").with_value(3.0).with_bounds(1.0, 5.0),
        Some(0.5),
    )
    .unwrap();
    assert_close(model.beta_l().unwrap(), 1.0);
    assert_close(model.beta_u().unwrap(), 3.0);

    // Crossed begin/end are resolved inside the model
    model.set_trainable_values(&[3.0, 2.0]).unwrap();
    assert_close(model.beta_l().unwrap(), 2.0);
    assert_close(model.beta_u().unwrap(), 3.0);

    // Begin too close to the upper end is pulled back by gamma_d
    model.set_trainable_values(&[4.9, 4.9]).unwrap();
    assert_close(model.beta_l().unwrap(), 4.5);
    assert_close(model.beta_u().unwrap(), 4.9);
}

#[test]
fn test_gamma_d_validation() {
    let result = AlignmentModel::new(
        Arc::new(f64::sin),
        Arc::new(f64::cos),
        Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0),
        Parameter::new("b").with_value(1.0).with_bounds(0.0, 4.0),
        Parameter::new("e").with_value(3.0).with_bounds(1.0, 5.0),
        Some(6.0),
    );
    assert!(result.is_err());
}

#[test]
fn test_relative_lengths_share_available_length() {
    let mut model = create_model();
    model.add_interval(Interval::constant(0.2, 0.14).unwrap(), None).unwrap();
    model.add_interval(Interval::relative(0.4, Some(1.0)).unwrap(), None).unwrap();
    model.add_interval(Interval::relative(0.4, Some(3.0)).unwrap(), None).unwrap();

    assert_close(model.available_length().unwrap(), 3.0);
    assert_eq!(model.relative_lengths(), vec![1.0, 3.0]);
    assert_eq!(model.mu_r(), 0.0);
    assert_close(model.interval_length(1).unwrap(), 0.75);
    assert_close(model.interval_length(2).unwrap(), 2.25);

    assert_close(model.interval_offset(0).unwrap(), 0.0);
    assert_close(model.interval_offset(1).unwrap(), 0.14);
    assert_close(model.interval_offset(2).unwrap(), 0.89);
}

#[test]
fn test_zero_relative_lengths_split_evenly() {
    let mut model = create_model();
    model.add_interval(Interval::relative(0.5, None).unwrap(), None).unwrap();
    model.add_interval(Interval::relative(0.5, Some(0.0)).unwrap(), None).unwrap();

    assert_eq!(model.mu_r(), 0.5);
    assert_eq!(model.vartheta_r(), vec![0.5, 0.5]);
    assert_close(model.interval_length(0).unwrap(), 1.57);
    assert_close(model.interval_length(1).unwrap(), 1.57);
}

#[test]
fn test_flexible_takes_remaining_length() {
    let mut model = create_model();
    model.add_interval(Interval::min_max(0.5, 1.0, Some((0.5, 2.0))).unwrap(), None).unwrap();
    model.add_interval(Interval::flexible(0.5).unwrap(), None).unwrap();

    assert_close(model.interval_length(1).unwrap(), 2.14);
    let total: f64 = model.interval_lengths().unwrap().iter().sum();
    assert_close(total, model.beta_u().unwrap() - model.beta_l().unwrap());
}

#[test]
fn test_interval_index_errors() {
    let model = create_model();
    assert!(matches!(model.interval_length(0), Err(DomainError::OutOfRange(_))));
    assert!(model.interval_offset(3).is_err());
}

#[test]
fn test_trainable_params_dicts() {
    let mut model = create_model();
    model.add_interval(Interval::constant(0.2, 1.0).unwrap(), None).unwrap();
    model.add_interval(Interval::min_max(0.3, 1.0, Some((0.5, 2.0))).unwrap(), None).unwrap();

    let values = model.trainable_params_as_dict();
    assert_eq!(values.len(), 3);
    assert_eq!(values["begin_1"], Some(0.0));
    assert_eq!(values["end_2"], Some(3.14));
    assert_eq!(values["len_3"], Some(1.0));

    let lower = model.lower_bounds_as_dict();
    assert_eq!(lower["len_3"], Some(0.5));
    let upper = model.upper_bounds_as_dict();
    assert_eq!(upper["end_2"], Some(5.0));

    assert_eq!(model.params().len(), 4);
}

#[test]
fn test_set_trainable_values() {
    let mut model = create_model();
    model.add_interval(Interval::min_max(0.3, 1.0, None).unwrap(), None).unwrap();
    assert_eq!(model.trainable_values(), vec![0.0, 3.14, 1.0]);

    model.set_trainable_values(&[0.5, 3.0, 1.5]).unwrap();
    assert_eq!(model.trainable_values(), vec![0.5, 3.0, 1.5]);

    assert!(model.set_trainable_values(&[0.5]).is_err());
    assert!(model.set_trainable_values(&[0.5, f64::NAN, 1.0]).is_err());
}
