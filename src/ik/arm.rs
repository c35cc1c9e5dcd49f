use std::f32::consts::PI;

use glam::{Mat3, Vec3};
use nalgebra::DMatrix;
use rand::Rng;

use super::jacobian::{central_difference, pseudo_inverse_step};
use crate::error::{RigError, RigResult};
use crate::math::{axis_angle3, AxisAngle, Pose};
use crate::skeleton::JointType;

#[derive(Debug, Clone, Copy)]
pub struct ArmConfig {
    pub epsilon: f32,
    pub pinv_tolerance: f32,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            epsilon: PI / 128.0,
            pinv_tolerance: 1e-4,
        }
    }
}

impl ArmConfig {
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_pinv_tolerance(mut self, tolerance: f32) -> Self {
        self.pinv_tolerance = tolerance;
        self
    }
}

/// One link of an [`Arm`]: a joint followed by a segment of `length` along
/// the joint's local +Z.
///
/// Ball joints expose `[theta, phi, angle]` of `local`, pin joints only its
/// `angle` about the fixed axis, prismatic joints only `length`.
#[derive(Debug, Clone, Copy)]
pub struct ArmJoint {
    pub joint_type: JointType,
    pub length: f32,
    pub local: AxisAngle,
}

impl ArmJoint {
    pub fn param_count(&self) -> usize {
        self.joint_type.param_count()
    }

    fn write_params(&self, out: &mut Vec<f32>) {
        match self.joint_type {
            JointType::Ball => out.extend([self.local.theta(), self.local.phi(), self.local.angle]),
            JointType::Pin => out.push(self.local.angle),
            JointType::Prismatic => out.push(self.length),
        }
    }

    fn read_params(&mut self, params: &[f32]) {
        match self.joint_type {
            JointType::Ball => {
                self.local = AxisAngle::new(params[0], params[1], params[2]);
            }
            JointType::Pin => self.local.angle = params[0],
            JointType::Prismatic => self.length = params[0],
        }
    }
}

/// Serial chain with an analytic and a numeric forward Jacobian.
///
/// Joint `i` sits at `global_translation(i)` with global rotation
/// `R_i = R_{i-1} · L_i`, where `L_i` is its local rotation and `R_{-1}` the
/// anchor's. The tip is the far end of the last segment.
#[derive(Debug, Clone)]
pub struct Arm {
    anchor: Pose,
    joints: Vec<ArmJoint>,
    global_rotations: Vec<Mat3>,
    global_translations: Vec<Vec3>,
    tip: Vec3,
    rotation_derivatives: Vec<[Mat3; 3]>,
    config: ArmConfig,
}

impl Arm {
    pub fn new(lengths: &[f32]) -> Self {
        let mut arm = Self {
            anchor: Pose::IDENTITY,
            joints: Vec::with_capacity(lengths.len()),
            global_rotations: Vec::new(),
            global_translations: Vec::new(),
            tip: Vec3::ZERO,
            rotation_derivatives: Vec::new(),
            config: ArmConfig::default(),
        };
        for &length in lengths {
            arm.joints.push(ArmJoint {
                joint_type: JointType::Ball,
                length,
                local: AxisAngle::IDENTITY,
            });
        }
        arm.refresh();
        arm
    }

    pub fn with_anchor(mut self, anchor: Pose) -> Self {
        self.anchor = anchor;
        self.refresh();
        self
    }

    pub fn with_config(mut self, config: ArmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn append(&mut self, length: f32, joint_type: JointType, rotation: impl Into<AxisAngle>) {
        self.joints.push(ArmJoint {
            joint_type,
            length,
            local: rotation.into(),
        });
        self.rotation_derivatives.push([Mat3::ZERO; 3]);
        let last = self.joints.len() - 1;
        self.update_rotation_derivative(Some(last));
        self.update_global_transforms(last);
    }

    pub fn anchor(&self) -> Pose {
        self.anchor
    }

    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joints(&self) -> &[ArmJoint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> RigResult<&ArmJoint> {
        self.joints.get(index).ok_or(RigError::JointOutOfRange {
            index,
            len: self.joints.len(),
        })
    }

    fn joint_mut(&mut self, index: usize) -> RigResult<&mut ArmJoint> {
        let len = self.joints.len();
        self.joints
            .get_mut(index)
            .ok_or(RigError::JointOutOfRange { index, len })
    }

    pub fn set_local_rotation(&mut self, index: usize, rotation: Vec3) -> RigResult<()> {
        self.set_local_axis_angle(index, AxisAngle::from_rotation_vector(rotation))
    }

    pub fn set_local_axis_angle(&mut self, index: usize, rotation: AxisAngle) -> RigResult<()> {
        self.joint_mut(index)?.local = rotation;
        self.joint_changed(index);
        Ok(())
    }

    pub fn set_local_rotation_theta(&mut self, index: usize, theta: f32) -> RigResult<()> {
        self.joint_mut(index)?.local.axis.x = theta;
        self.joint_changed(index);
        Ok(())
    }

    pub fn set_local_rotation_phi(&mut self, index: usize, phi: f32) -> RigResult<()> {
        self.joint_mut(index)?.local.axis.y = phi;
        self.joint_changed(index);
        Ok(())
    }

    pub fn set_local_rotation_angle(&mut self, index: usize, angle: f32) -> RigResult<()> {
        self.joint_mut(index)?.local.angle = angle;
        self.joint_changed(index);
        Ok(())
    }

    pub fn set_length(&mut self, index: usize, length: f32) -> RigResult<()> {
        self.joint_mut(index)?.length = length;
        self.update_global_transforms(index);
        Ok(())
    }

    fn joint_changed(&mut self, index: usize) {
        self.update_rotation_derivative(Some(index));
        self.update_global_transforms(index);
    }

    fn refresh(&mut self) {
        self.rotation_derivatives = vec![[Mat3::ZERO; 3]; self.joints.len()];
        self.update_rotation_derivative(None);
        self.update_global_transforms(0);
    }

    pub fn param_count(&self) -> usize {
        self.joints.iter().map(ArmJoint::param_count).sum()
    }

    pub fn params(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.param_count());
        for joint in &self.joints {
            joint.write_params(&mut params);
        }
        params
    }

    pub fn set_params(&mut self, params: &[f32]) -> RigResult<()> {
        let expected = self.param_count();
        if params.len() != expected {
            return Err(RigError::ParamCountMismatch {
                expected,
                provided: params.len(),
            });
        }
        apply_params(&mut self.joints, params);
        self.update_rotation_derivative(None);
        self.update_global_transforms(0);
        Ok(())
    }

    pub fn arm_length(&self) -> f32 {
        self.joints.iter().map(|j| j.length).sum()
    }

    pub fn tip(&self) -> Vec3 {
        self.tip
    }

    pub fn global_translation(&self, index: usize) -> RigResult<Vec3> {
        self.joint(index)?;
        Ok(self.global_translations[index])
    }

    pub fn global_rotation(&self, index: usize) -> RigResult<Vec3> {
        self.joint(index)?;
        Ok(axis_angle3(self.global_rotations[index]))
    }

    /// Randomly reorients every joint: ball joints within a cap of `d_arc`
    /// plus a spin of up to `d_polar`, pin joints by up to `d_polar`.
    pub fn jiggle<R: Rng + ?Sized>(&mut self, rng: &mut R, d_arc: f32, d_polar: f32) {
        let spin = d_polar.abs();
        for joint in &mut self.joints {
            match joint.joint_type {
                JointType::Ball => joint.local.perturb(rng, d_arc, d_polar),
                JointType::Pin if spin > 0.0 => joint.local.angle += rng.gen_range(-spin..=spin),
                JointType::Pin | JointType::Prismatic => {}
            }
        }
        self.update_rotation_derivative(None);
        self.update_global_transforms(0);
    }

    pub fn update_global_transforms(&mut self, from: usize) {
        let n = self.joints.len();
        self.global_rotations.resize(n, Mat3::IDENTITY);
        self.global_translations.resize(n, Vec3::ZERO);
        let from = from.min(n);

        let (mut rotation, mut translation) = if from == 0 {
            (self.anchor.rotation_matrix(), self.anchor.translation)
        } else {
            let prev = from - 1;
            (
                self.global_rotations[prev],
                self.global_translations[prev]
                    + self.global_rotations[prev] * Vec3::Z * self.joints[prev].length,
            )
        };
        for i in from..n {
            rotation *= self.joints[i].local.to_matrix();
            self.global_rotations[i] = rotation;
            self.global_translations[i] = translation;
            translation += rotation * Vec3::Z * self.joints[i].length;
        }
        self.tip = translation;
    }

    /// Refreshes the cached `∂L/∂theta`, `∂L/∂phi`, `∂L/∂angle` of one joint,
    /// or of all joints when `joint` is `None`.
    pub fn update_rotation_derivative(&mut self, joint: Option<usize>) {
        let range = match joint {
            Some(i) if i < self.joints.len() => i..i + 1,
            Some(_) => return,
            None => 0..self.joints.len(),
        };
        for i in range {
            let local = self.joints[i].local;
            self.rotation_derivatives[i] = [local.d_theta(), local.d_phi(), local.d_angle()];
        }
    }

    pub fn forward_jacobian_analytic(&self) -> DMatrix<f32> {
        let n = self.joints.len();
        let mut jacobian = DMatrix::zeros(3, self.param_count());
        if n == 0 {
            return jacobian;
        }
        let locals: Vec<Mat3> = self.joints.iter().map(|j| j.local.to_matrix()).collect();

        // suffix[j]: tip offset from joint j expressed in joint j's frame,
        // with L_j itself factored out.
        let mut suffix = vec![Vec3::ZERO; n];
        suffix[n - 1] = Vec3::Z * self.joints[n - 1].length;
        for j in (0..n - 1).rev() {
            suffix[j] = Vec3::Z * self.joints[j].length + locals[j + 1] * suffix[j + 1];
        }

        let mut column = 0;
        let mut put = |derivative: Vec3| {
            jacobian[(0, column)] = derivative.x;
            jacobian[(1, column)] = derivative.y;
            jacobian[(2, column)] = derivative.z;
            column += 1;
        };
        for (j, joint) in self.joints.iter().enumerate() {
            let prefix = if j == 0 {
                self.anchor.rotation_matrix()
            } else {
                self.global_rotations[j - 1]
            };
            let [d_theta, d_phi, d_angle] = self.rotation_derivatives[j];
            match joint.joint_type {
                JointType::Ball => {
                    put(prefix * d_theta * suffix[j]);
                    put(prefix * d_phi * suffix[j]);
                    put(prefix * d_angle * suffix[j]);
                }
                JointType::Pin => put(prefix * d_angle * suffix[j]),
                JointType::Prismatic => put(self.global_rotations[j] * Vec3::Z),
            }
        }
        jacobian
    }

    pub fn forward_jacobian_numeric(&self) -> DMatrix<f32> {
        let mut scratch = self.joints.clone();
        central_difference(&self.params(), self.config.epsilon, |params| {
            apply_params(&mut scratch, params);
            chain_tip(&self.anchor, &scratch)
        })
    }

    /// Moves every parameter by `J⁺ · displacement` in one step, using the
    /// numeric Jacobian.
    pub fn nudge_tip(&mut self, displacement: Vec3) -> RigResult<()> {
        if self.joints.is_empty() {
            return Ok(());
        }
        let jacobian = self.forward_jacobian_numeric();
        let step = pseudo_inverse_step(&jacobian, displacement, self.config.pinv_tolerance)?;
        let params: Vec<f32> = self
            .params()
            .iter()
            .zip(&step)
            .map(|(p, d)| p + d)
            .collect();
        self.set_params(&params)
    }
}

fn apply_params(joints: &mut [ArmJoint], params: &[f32]) {
    let mut offset = 0;
    for joint in joints {
        let count = joint.param_count();
        joint.read_params(&params[offset..offset + count]);
        offset += count;
    }
}

fn chain_tip(anchor: &Pose, joints: &[ArmJoint]) -> Vec3 {
    let mut rotation = anchor.rotation_matrix();
    let mut tip = anchor.translation;
    for joint in joints {
        rotation *= joint.local.to_matrix();
        tip += rotation * Vec3::Z * joint.length;
    }
    tip
}
