//! Vehicle geometry resolution
//!
//! The three geometric quantities the kinematics need (wheel separation,
//! wheel radius and wheel base) can be given explicitly in the parameter
//! file, or resolved from a vehicle description document. Explicit values
//! always win.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// Internal
use super::Params;
use util::params::LoadError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Resolved geometry of the vehicle.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct VehGeometry {
    /// Lateral distance between the left and right wheels.
    ///
    /// Units: meters
    pub wheel_separation_m: f64,

    /// Radius of the wheels.
    ///
    /// Units: meters
    pub wheel_radius_m: f64,

    /// Longitudinal distance between the wheel axle and the steering axle.
    ///
    /// Units: meters
    pub wheel_base_m: f64,
}

/// A vehicle description document loaded from TOML.
///
/// Joints give their origin in the body frame and the link they drive, links
/// optionally give a cylinder collision radius.
#[derive(Debug, Default, Deserialize)]
pub struct VehDescription {
    joints: HashMap<String, JointDesc>,
    links: HashMap<String, LinkDesc>,
}

#[derive(Debug, Deserialize)]
struct JointDesc {
    /// Origin of the joint in the body frame.
    ///
    /// Units: meters
    origin_m: [f64; 3],

    /// Name of the link driven by this joint.
    child_link: String,
}

#[derive(Debug, Deserialize)]
struct LinkDesc {
    /// Radius of the link's cylinder collision geometry, if it has one.
    ///
    /// Units: meters
    #[serde(default)]
    cylinder_radius_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while resolving geometry from a description.
#[derive(Debug, Error)]
pub enum GeomError {
    #[error("joint \"{0}\" is not in the vehicle description")]
    UnknownJoint(String),

    #[error("link \"{0}\" is not in the vehicle description")]
    UnknownLink(String),

    #[error("link \"{0}\" has no cylinder collision geometry")]
    NoCylinder(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of vehicle description data.
///
/// Only the two lookups the geometry resolution needs are exposed, so any
/// richer description format can back it.
pub trait DescriptionSource {
    /// Origin of the named joint in the body frame.
    ///
    /// Units: meters
    fn resolve_joint_offset(
        &self,
        joint_name: &str,
    ) -> Result<Vector3<f64>, GeomError>;

    /// Cylinder radius of the link driven by the named joint.
    ///
    /// Units: meters
    fn resolve_link_radius(&self, joint_name: &str) -> Result<f64, GeomError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehDescription {
    /// Load a description from a file under the params directory.
    pub fn load(desc_file_path: &str) -> Result<Self, LoadError> {
        util::params::load(desc_file_path)
    }

    fn joint(&self, joint_name: &str) -> Result<&JointDesc, GeomError> {
        self.joints
            .get(joint_name)
            .ok_or_else(|| GeomError::UnknownJoint(joint_name.to_string()))
    }
}

impl DescriptionSource for VehDescription {
    fn resolve_joint_offset(
        &self,
        joint_name: &str,
    ) -> Result<Vector3<f64>, GeomError> {
        let joint = self.joint(joint_name)?;
        Ok(Vector3::from(joint.origin_m))
    }

    fn resolve_link_radius(&self, joint_name: &str) -> Result<f64, GeomError> {
        let joint = self.joint(joint_name)?;

        let link = self
            .links
            .get(&joint.child_link)
            .ok_or_else(|| GeomError::UnknownLink(joint.child_link.clone()))?;

        link.cylinder_radius_m
            .ok_or_else(|| GeomError::NoCylinder(joint.child_link.clone()))
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Resolve the vehicle geometry from the parameters and the optional
/// description.
///
/// Every quantity that cannot be resolved appends a problem description to
/// `failures` and leaves a zero in the result, so a single pass reports all
/// missing pieces at once.
pub(crate) fn resolve_geometry(
    params: &Params,
    desc: Option<&dyn DescriptionSource>,
    failures: &mut Vec<String>,
) -> VehGeometry {
    let mut geom = VehGeometry::default();

    match params.wheel_separation_m {
        Some(v) => geom.wheel_separation_m = v,
        None => match resolve_separation(params, desc) {
            Ok(v) => geom.wheel_separation_m = v,
            Err(msg) => failures.push(msg),
        },
    }

    match params.wheel_radius_m {
        Some(v) => geom.wheel_radius_m = v,
        None => match resolve_radius(params, desc) {
            Ok(v) => geom.wheel_radius_m = v,
            Err(msg) => failures.push(msg),
        },
    }

    match params.wheel_base_m {
        Some(v) => geom.wheel_base_m = v,
        None => match resolve_base(params, desc) {
            Ok(v) => geom.wheel_base_m = v,
            Err(msg) => failures.push(msg),
        },
    }

    // Whatever the source, a zero or negative quantity is unusable
    for (name, value) in [
        ("wheel_separation_m", geom.wheel_separation_m),
        ("wheel_radius_m", geom.wheel_radius_m),
        ("wheel_base_m", geom.wheel_base_m),
    ]
    .iter()
    {
        if !(*value > 0.0) && !failures.iter().any(|f| f.contains(name)) {
            failures.push(format!(
                "resolved {} must be positive, got {}",
                name, value
            ));
        }
    }

    geom
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the description, or explain why a quantity cannot be resolved.
fn require_desc<'a>(
    desc: Option<&'a dyn DescriptionSource>,
    quantity: &str,
) -> Result<&'a dyn DescriptionSource, String> {
    desc.ok_or_else(|| {
        format!(
            "{} is not given and no vehicle description is available",
            quantity
        )
    })
}

/// First joint of a name list, or explain that the list is empty.
fn first_joint<'a>(
    joints: &'a [String],
    list_name: &str,
) -> Result<&'a str, String> {
    joints
        .first()
        .map(|s| s.as_str())
        .ok_or_else(|| format!("{} is empty", list_name))
}

/// Wheel separation is the distance between the first left and right wheel
/// joint origins.
fn resolve_separation(
    params: &Params,
    desc: Option<&dyn DescriptionSource>,
) -> Result<f64, String> {
    let desc = require_desc(desc, "wheel_separation_m")?;
    let left = first_joint(&params.left_wheel_joints, "left_wheel_joints")?;
    let right = first_joint(&params.right_wheel_joints, "right_wheel_joints")?;

    let left_pos = desc
        .resolve_joint_offset(left)
        .map_err(|e| format!("wheel_separation_m: {}", e))?;
    let right_pos = desc
        .resolve_joint_offset(right)
        .map_err(|e| format!("wheel_separation_m: {}", e))?;

    Ok((left_pos - right_pos).norm())
}

/// Wheel radius comes from the first left wheel joint's child link.
fn resolve_radius(
    params: &Params,
    desc: Option<&dyn DescriptionSource>,
) -> Result<f64, String> {
    let desc = require_desc(desc, "wheel_radius_m")?;
    let left = first_joint(&params.left_wheel_joints, "left_wheel_joints")?;

    desc.resolve_link_radius(left)
        .map_err(|e| format!("wheel_radius_m: {}", e))
}

/// Wheel base is the distance between the first left wheel and first left
/// steering joint origins.
fn resolve_base(
    params: &Params,
    desc: Option<&dyn DescriptionSource>,
) -> Result<f64, String> {
    let desc = require_desc(desc, "wheel_base_m")?;
    let wheel = first_joint(&params.left_wheel_joints, "left_wheel_joints")?;
    let steer = first_joint(&params.left_steer_joints, "left_steer_joints")?;

    let wheel_pos = desc
        .resolve_joint_offset(wheel)
        .map_err(|e| format!("wheel_base_m: {}", e))?;
    let steer_pos = desc
        .resolve_joint_offset(steer)
        .map_err(|e| format!("wheel_base_m: {}", e))?;

    Ok((wheel_pos - steer_pos).norm())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::drive_ctrl::TopologyKind;

    const DESC_TOML: &str = r#"
        [joints.wheel_lf]
        origin_m = [0.0, 0.25, 0.0]
        child_link = "wheel_lf_link"

        [joints.wheel_rf]
        origin_m = [0.0, -0.25, 0.0]
        child_link = "wheel_rf_link"

        [joints.steer_lf]
        origin_m = [0.7, 0.25, 0.0]
        child_link = "steer_lf_link"

        [links.wheel_lf_link]
        cylinder_radius_m = 0.1

        [links.wheel_rf_link]
        cylinder_radius_m = 0.1

        [links.steer_lf_link]
    "#;

    fn desc() -> VehDescription {
        toml::from_str(DESC_TOML).unwrap()
    }

    fn params_without_geometry() -> Params {
        Params {
            topology: TopologyKind::Ackermann,
            left_wheel_joints: vec!["wheel_lf".into()],
            right_wheel_joints: vec!["wheel_rf".into()],
            left_steer_joints: vec!["steer_lf".into()],
            right_steer_joints: vec!["steer_rf".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_description_lookups() {
        let desc = desc();

        let offset = desc.resolve_joint_offset("wheel_lf").unwrap();
        assert_eq!(offset, Vector3::new(0.0, 0.25, 0.0));

        assert_eq!(desc.resolve_link_radius("wheel_lf").unwrap(), 0.1);

        assert!(matches!(
            desc.resolve_joint_offset("no_such_joint"),
            Err(GeomError::UnknownJoint(_))
        ));
        assert!(matches!(
            desc.resolve_link_radius("steer_lf"),
            Err(GeomError::NoCylinder(_))
        ));
    }

    #[test]
    fn test_explicit_geometry_wins() {
        let mut params = params_without_geometry();
        params.wheel_separation_m = Some(0.6);
        params.wheel_radius_m = Some(0.12);
        params.wheel_base_m = Some(0.8);

        let desc = desc();
        let mut failures = vec![];
        let geom =
            resolve_geometry(&params, Some(&desc), &mut failures);

        assert!(failures.is_empty());
        assert_eq!(geom.wheel_separation_m, 0.6);
        assert_eq!(geom.wheel_radius_m, 0.12);
        assert_eq!(geom.wheel_base_m, 0.8);
    }

    #[test]
    fn test_geometry_from_description() {
        let params = params_without_geometry();
        let desc = desc();
        let mut failures = vec![];

        let geom = resolve_geometry(&params, Some(&desc), &mut failures);

        assert!(failures.is_empty(), "failures: {:?}", failures);
        assert!((geom.wheel_separation_m - 0.5).abs() < 1e-12);
        assert_eq!(geom.wheel_radius_m, 0.1);
        assert!((geom.wheel_base_m - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_quantities_reported() {
        let params = params_without_geometry();
        let mut failures = vec![];

        resolve_geometry(&params, None, &mut failures);

        // Each unresolved quantity is reported, not just the first
        assert_eq!(failures.len(), 3);
        assert!(failures
            .iter()
            .any(|f| f.contains("wheel_separation_m")));
        assert!(failures.iter().any(|f| f.contains("wheel_radius_m")));
        assert!(failures.iter().any(|f| f.contains("wheel_base_m")));
    }
}
