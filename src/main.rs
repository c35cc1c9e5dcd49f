use glam::Vec3;
use rig_ik::ik::{Arm, Body, NudgeConfig, Parameterization, Path};
use rig_ik::math::{AxisAngle, Pose};
use rig_ik::skeleton::{BuiltChain, ComponentId, JointType, RigBuilder};

const FRAMES: usize = 2000;
const LOG_EVERY: usize = 200;
const PATH_STEP: f32 = 0.005;
const NUDGE_STEP: f32 = 0.01;

struct App {
    chain: BuiltChain,
    body: Body,
    path: Path,
    effector: ComponentId,
}

impl App {
    fn new() -> Self {
        let chain = RigBuilder::new()
            .root_pose(Pose::new(Vec3::new(0.0, -0.5, -4.0), Vec3::ZERO))
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[(JointType::BALL_THETA, 1.2), (JointType::BALL_ANGLE, 0.4)],
            )
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[
                    (JointType::BALL_THETA, 1.4),
                    (JointType::BALL_PHI, 1.6),
                    (JointType::BALL_ANGLE, 0.3),
                ],
            )
            .add_segment(JointType::Pin, 0.8)
            .build();

        let mut body = Body::new(chain.root())
            .with_config(NudgeConfig::default().with_step(NUDGE_STEP));
        body.anchor(&chain.rig, chain.root().into(), true, true);

        let path = Path::new(Parameterization::Cardioid, 1.0)
            .with_pose(Pose::from_translation(Vec3::new(0.0, -0.5, -2.0)));
        let effector = chain.tip.into();

        Self {
            chain,
            body,
            path,
            effector,
        }
    }

    fn update(&mut self) -> Vec3 {
        let target = self.path.step_t(PATH_STEP);
        self.body
            .set_translation(&mut self.chain.rig, self.effector, target);
        target
    }

    fn report(&self, frame: usize, target: Vec3) {
        let Some(tip) = self.chain.rig.global_translation(self.effector) else {
            return;
        };
        log::info!(
            "frame {frame}: tip {tip:?} target {target:?} distance {:.4}",
            tip.distance(target)
        );
    }
}

fn run_arm() {
    let mut arm = Arm::new(&[1.0, 1.0]);
    arm.append(0.5, JointType::Pin, AxisAngle::new(1.0, 0.5, 0.2));
    if let Err(err) = arm.set_local_axis_angle(0, AxisAngle::new(0.6, 0.1, 0.4)) {
        log::error!("arm setup failed: {err}");
        return;
    }

    let target = arm.tip() + Vec3::new(0.3, -0.2, 0.1);
    for _ in 0..100 {
        let Some(direction) = (target - arm.tip()).try_normalize() else {
            break;
        };
        let step = direction * NUDGE_STEP.min(arm.tip().distance(target));
        if let Err(err) = arm.nudge_tip(step) {
            log::error!("arm nudge failed: {err}");
            break;
        }
    }
    log::info!(
        "arm tip {:?}, {:.4} from target",
        arm.tip(),
        arm.tip().distance(target)
    );
}

fn main() {
    env_logger::init();

    let mut app = App::new();
    log::info!(
        "rig with {} bones, route {:?}",
        app.chain.bones.len(),
        app.body.route_sockets(&app.chain.rig, app.effector)
    );
    for frame in 0..FRAMES {
        let target = app.update();
        if frame % LOG_EVERY == 0 {
            app.report(frame, target);
        }
    }

    run_arm();
}
