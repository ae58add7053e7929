// Integration tests for building the cross section context from a library
// file and looking up macroscopic and microscopic data.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use yamc_mg::{
    sqrt_kt_from_kelvin, Error, JsonLibrary, MaterialSpec, MgxsInterface, TemperatureMethod,
    TemperatureSelector, XsQuery, XsType,
};

fn library_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/mgxs_2g.json")
}

fn library() -> JsonLibrary {
    JsonLibrary::from_file(library_path()).unwrap()
}

fn water(density: f64) -> MaterialSpec {
    let mut m = MaterialSpec::new("water").with_id(1);
    m.add_nuclide("H1", density).unwrap();
    m
}

fn fuel() -> MaterialSpec {
    let mut m = MaterialSpec::new("fuel").with_id(2);
    m.add_nuclide("U235", 0.5).unwrap();
    m.add_nuclide("H1", 1.0).unwrap();
    m
}

fn build(materials: &[MaterialSpec]) -> MgxsInterface {
    MgxsInterface::build(&library(), materials, TemperatureSelector::default(), 293.6).unwrap()
}

#[test]
fn test_single_nuclide_total_scales_with_density() {
    let xs = build(&[water(3.0)]);
    let sqrt_kt = sqrt_kt_from_kelvin(293.6);
    let q = XsQuery::new();
    assert_relative_eq!(xs.get_macro_xs(0, XsType::Total, 0, &q), 3.0, epsilon = 1e-12);
    assert_relative_eq!(xs.get_macro_xs(0, XsType::Total, 1, &q), 6.0, epsilon = 1e-12);

    let (total, absorption, nu_fission) = xs.calculate_xs(0, 1, sqrt_kt, &[0.0, 0.0, 1.0]);
    assert_relative_eq!(total, 6.0, epsilon = 1e-12);
    assert_relative_eq!(absorption, 1.5, epsilon = 1e-12);
    assert_eq!(nu_fission, 0.0);
    assert!(!xs.is_fissionable(0));
}

#[test]
fn test_mixture_of_fissionable_and_moderator() {
    let xs = build(&[water(3.0), fuel()]);
    assert_eq!(xs.num_materials(), 2);
    assert_eq!(xs.num_nuclides(), 2);
    assert_eq!(xs.mark_fissionable_mgxs_materials(), vec![false, true]);

    let sqrt_kt = sqrt_kt_from_kelvin(293.6);
    let (total, absorption, nu_fission) = xs.calculate_xs(1, 0, sqrt_kt, &[1.0, 0.0, 0.0]);
    assert_relative_eq!(total, 2.5, epsilon = 1e-12);
    assert_relative_eq!(absorption, 0.7, epsilon = 1e-12);
    assert_relative_eq!(nu_fission, 0.6, epsilon = 1e-12);

    // chi is a normalized spectrum born entirely in the fast group
    let q = XsQuery::new().outgoing(0);
    assert_relative_eq!(xs.get_macro_xs(1, XsType::ChiPrompt, 1, &q), 1.0, epsilon = 1e-12);
    let q = XsQuery::new().outgoing(1);
    assert_relative_eq!(xs.get_macro_xs(1, XsType::ChiPrompt, 1, &q), 0.0, epsilon = 1e-12);
}

#[test]
fn test_fast_path_matches_general_lookup() {
    let xs = build(&[water(3.0), fuel()]);
    let sqrt_kt = sqrt_kt_from_kelvin(293.6);
    for mat in 0..xs.num_materials() {
        for gin in 0..xs.num_energy_groups() {
            let (total, absorption, nu_fission) = xs.calculate_xs(mat, gin, sqrt_kt, &[0.0, 1.0, 0.0]);
            let q = XsQuery::new().at_sqrt_kt(sqrt_kt);
            assert_eq!(total, xs.get_macro_xs(mat, XsType::Total, gin, &q));
            assert_eq!(absorption, xs.get_macro_xs(mat, XsType::Absorption, gin, &q));
            if xs.is_fissionable(mat) {
                assert_eq!(nu_fission, xs.get_macro_xs(mat, XsType::NuFission, gin, &q));
            }
        }
    }
}

#[test]
fn test_nuclide_lookups_and_identity() {
    let xs = build(&[fuel()]);
    let u235 = xs.nuclide_index("U235").unwrap();
    assert_eq!(xs.get_name(u235), "U235");
    assert_relative_eq!(xs.get_awr(u235), 233.0248);

    let q = XsQuery::new();
    assert_relative_eq!(xs.get_nuclide_xs(u235, XsType::NuFission, 1, &q), 3.0, epsilon = 1e-12);
    let delayed = xs.get_nuclide_xs(u235, XsType::DelayedNuFission, 1, &q.delayed_group(0));
    assert_relative_eq!(delayed, 0.0065 * 3.0, epsilon = 1e-12);
    let prompt = xs.get_nuclide_xs(u235, XsType::PromptNuFission, 1, &q);
    assert_relative_eq!(prompt + delayed, 3.0, epsilon = 1e-12);

    let h1 = xs.nuclide_index("H1").unwrap();
    let err = xs.try_get_nuclide_xs(h1, XsType::Fission, 0, &q).unwrap_err();
    assert!(matches!(err, Error::Programming(_)));
}

#[test]
fn test_unknown_nuclide_is_configuration_error() {
    let mut m = MaterialSpec::new("bad");
    m.add_nuclide("U-238x", 1.0).unwrap();
    let err = MgxsInterface::build(&library(), &[m], TemperatureSelector::default(), 293.6).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.to_string().contains("U-238x"));
}

#[test]
fn test_temperature_outside_tolerance_is_configuration_error() {
    let mut m = fuel();
    m.add_temperature(600.0);
    let err = MgxsInterface::build(&library(), &[m], TemperatureSelector::default(), 293.6).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_multiple_temperatures_select_nearest() {
    let mut hot = water(1.0);
    hot.add_temperature(294.0);
    hot.add_temperature(600.0);
    let xs = build(&[hot]);
    assert_eq!(xs.macro_xs(0).unwrap().kts().len(), 2);

    let (cold_total, _, _) = xs.calculate_xs(0, 0, sqrt_kt_from_kelvin(300.0), &[0.0, 0.0, 1.0]);
    let (hot_total, _, _) = xs.calculate_xs(0, 0, sqrt_kt_from_kelvin(590.0), &[0.0, 0.0, 1.0]);
    assert_relative_eq!(cold_total, 1.0, epsilon = 1e-12);
    assert_relative_eq!(hot_total, 1.1, epsilon = 1e-12);
}

#[test]
fn test_interpolation_selector_for_nuclide_lookups() {
    let mut hot = water(1.0);
    hot.add_temperature(294.0);
    hot.add_temperature(600.0);
    let selector = TemperatureSelector::new(TemperatureMethod::Interpolation, 10.0);
    let xs = MgxsInterface::build(&library(), &[hot], selector, 293.6).unwrap();
    let h1 = xs.nuclide_index("H1").unwrap();

    let kts = xs.nuclide(h1).unwrap().kts().to_vec();
    let mid = (0.5 * (kts[0] + kts[1])).sqrt();
    let total = xs.get_nuclide_xs(h1, XsType::Total, 1, &XsQuery::new().at_sqrt_kt(mid));
    assert_relative_eq!(total, 2.1, epsilon = 1e-9);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_group_equal_to_group_count_panics() {
    let xs = build(&[water(3.0)]);
    let g = xs.num_energy_groups();
    xs.calculate_xs(0, g, sqrt_kt_from_kelvin(293.6), &[0.0, 0.0, 1.0]);
}

#[test]
fn test_shared_context_across_threads() {
    let xs = Arc::new(build(&[water(3.0), fuel()]));
    let sqrt_kt = sqrt_kt_from_kelvin(293.6);
    let expected: Vec<(f64, f64, f64)> = (0..2)
        .flat_map(|mat| (0..2).map(move |g| (mat, g)))
        .map(|(mat, g)| xs.calculate_xs(mat, g, sqrt_kt, &[0.0, 0.0, 1.0]))
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let xs = Arc::clone(&xs);
            thread::spawn(move || {
                let mut out = Vec::new();
                for _ in 0..1000 {
                    out.clear();
                    for mat in 0..2 {
                        for g in 0..2 {
                            out.push(xs.calculate_xs(mat, g, sqrt_kt, &[0.0, 0.0, 1.0]));
                        }
                    }
                }
                out
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}
