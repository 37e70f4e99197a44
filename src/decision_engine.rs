// src/decision_engine.rs
//
// Rule-based pilot. Reads one Scene per frame and emits at most a handful of
// commands: START once, an UP dodge, a FIRE pulse and a single lateral move.
//
// Priority, top to bottom:
//   1. START after the boot delay (then the same frame carries on)
//   2. Hostiles, nearest to the player first:
//        plane whose predicted intercept is near the player → UP
//        aiming at it (or overlapping a bridge) and no fuel in between
//                                     → FIRE + move toward it, stop
//        roughly aligned and far      → move toward it
//        nearly aligned and close     → move away from it
//   3. Closest lane segment: get into it, then keep centred in it
//   4. Closest aligned fuel: move toward it
//
// There is one lateral slot per frame and the first rule that fills it wins,
// so the nearest hostile outranks lanes and fuel. A side blocked by terrain
// (PlayerState::can_move_*) never receives a move.

use crate::analysis::identity_tracker::TrackedHostile;
use crate::detection::player_locator::PlayerState;
use crate::pipeline::frame_context::Scene;
use crate::types::{Command, CommandToken, Direction, Entity};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::time::Duration;
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Delay after boot before START is pressed.
    pub start_delay_ms: u64,
    /// The game is already running (resumed from a saved state).
    pub auto_start: bool,
    /// Max |player.x - hostile.x| to count as aiming.
    pub aim_tolerance: i32,
    /// Alignment margin for firing at bridges.
    pub bridge_margin: i32,
    /// Alignment margin for pre-emptively lining up with a far hostile.
    pub approach_margin: i32,
    /// Alignment margin for sidestepping a close hostile.
    pub avoid_margin: i32,
    /// Vertical distance separating "far" from "close" hostiles.
    pub near_distance: i32,
    /// Max |player.x - intercept| that triggers the UP dodge.
    pub dodge_tolerance: f32,
    /// Alignment margin for fuel the player can reach.
    pub fuel_margin: i32,
    /// Centering tolerance inside a lane.
    pub lane_tolerance: i32,
    /// Looser centering tolerance while a fuel is within reach.
    pub lane_tolerance_with_fuel: i32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 3000,
            auto_start: false,
            aim_tolerance: 5,
            bridge_margin: 50,
            approach_margin: 5,
            avoid_margin: 25,
            near_distance: 50,
            dodge_tolerance: 70.0,
            fuel_margin: 35,
            lane_tolerance: 15,
            lane_tolerance_with_fuel: 50,
        }
    }
}

// ============================================================================
// FRAME PLAN
// ============================================================================

/// Commands collected during one `decide` call, flattened in a fixed order.
#[derive(Debug, Default)]
struct ActionPlan {
    start: bool,
    dodge: bool,
    fire: bool,
    lateral: Option<Direction>,
}

impl ActionPlan {
    fn into_commands(self) -> Vec<Command> {
        let mut commands = Vec::with_capacity(4);
        if self.start {
            commands.push(Command::hold(CommandToken::Start));
        }
        if self.dodge {
            commands.push(Command::hold(CommandToken::Up));
        }
        if self.fire {
            commands.push(Command::pulse(CommandToken::Fire));
        }
        if let Some(direction) = self.lateral {
            commands.push(Command::hold(direction.token()));
        }
        commands
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    Toward,
    Away,
}

impl Heading {
    fn sign(self) -> i32 {
        match self {
            Heading::Toward => 1,
            Heading::Away => -1,
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct DecisionEngine {
    config: DecisionConfig,
    started: bool,
    running: bool,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            started: config.auto_start,
            running: true,
            config,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Manual override: while not running only START is ever issued.
    pub fn set_running(&mut self, running: bool) {
        if running != self.running {
            info!(
                "🕹️ Manual override {}",
                if running { "released" } else { "engaged" }
            );
        }
        self.running = running;
    }

    /// Decide this frame's commands. `elapsed` is the time since the
    /// pipeline was created.
    pub fn decide(&mut self, scene: &Scene, elapsed: Duration) -> Vec<Command> {
        let mut plan = ActionPlan::default();

        if !self.started {
            if elapsed < Duration::from_millis(self.config.start_delay_ms) {
                return Vec::new();
            }
            info!("🏁 Pressing START after {} ms", elapsed.as_millis());
            self.started = true;
            plan.start = true;
        }

        if !self.running {
            return plan.into_commands();
        }

        let player = scene.player;
        if !player.is_present() {
            debug!("🛩️ no player this frame, holding");
            return plan.into_commands();
        }

        self.engage_hostiles(scene, &mut plan);
        self.navigate(scene, &mut plan);

        debug!(
            "🧭 plan: dodge={} fire={} move={:?}",
            plan.dodge, plan.fire, plan.lateral
        );
        plan.into_commands()
    }

    fn engage_hostiles(&self, scene: &Scene, plan: &mut ActionPlan) {
        let c = &self.config;
        let player = scene.player;
        let me = &player.entity;

        let mut hostiles: Vec<&TrackedHostile> = scene.hostiles.iter().collect();
        hostiles.sort_by_key(|h| Reverse(h.entity().y()));

        for hostile in hostiles {
            let target = hostile.entity();

            if target.kind().is_predictive() {
                if let Some(intercept) = hostile.predicted_intercept_x() {
                    if (me.x() as f32 - intercept).abs() < c.dodge_tolerance {
                        debug!(
                            "✈️ dodging #{} (intercept {:.0}, player x {})",
                            hostile.id(),
                            intercept,
                            me.x()
                        );
                        plan.dodge = true;
                    }
                }
            }

            let on_target = me.is_aiming(target, c.aim_tolerance)
                || (target.kind().is_wide_obstacle() && me.is_aligned(target, c.bridge_margin, 0));

            if on_target {
                if self.fuel_ahead(scene, target) {
                    debug!(
                        "⛽ holding fire on {} #{}: fuel in the way",
                        target.kind().as_str(),
                        hostile.id()
                    );
                    continue;
                }
                plan.fire = true;
                move_relative(plan, player, target, Heading::Toward);
                break;
            } else if me.is_aligned(target, c.approach_margin, 0)
                && me.y_diff(target) > c.near_distance
            {
                move_relative(plan, player, target, Heading::Toward);
            } else if me.is_aligned(target, c.avoid_margin, 0)
                && me.y_diff(target) < c.near_distance
            {
                move_relative(plan, player, target, Heading::Away);
            }
        }
    }

    /// A fuel aligned with the player sits between it and `target`.
    fn fuel_ahead(&self, scene: &Scene, target: &Entity) -> bool {
        let me = &scene.player.entity;
        scene
            .fuels
            .iter()
            .any(|f| me.is_aligned(f, 0, 0) && f.y() > target.y() && f.y() < me.y())
    }

    fn navigate(&self, scene: &Scene, plan: &mut ActionPlan) {
        let c = &self.config;
        let player = scene.player;
        let me = &player.entity;

        let mut near_fuels: Vec<&Entity> = scene
            .fuels
            .iter()
            .filter(|f| me.is_aligned(f, c.fuel_margin, 0))
            .collect();
        near_fuels.sort_by_key(|f| Reverse(f.y()));

        let closest_lane = scene
            .lanes
            .iter()
            .map(|l| l.as_entity())
            .min_by_key(|l| me.x_diff(l).abs());

        if let Some(lane) = closest_lane {
            let tolerance = if near_fuels.is_empty() {
                c.lane_tolerance
            } else {
                c.lane_tolerance_with_fuel
            };
            let inside = lane.left() <= me.left() && lane.right() >= me.right();
            if !inside || me.x_diff(&lane).abs() > tolerance {
                move_relative(plan, player, &lane, Heading::Toward);
            }
        }

        if let Some(fuel) = near_fuels.first() {
            move_relative(plan, player, fuel, Heading::Toward);
        }
    }
}

/// Fill the lateral slot if it is still free and the side is open.
fn move_relative(plan: &mut ActionPlan, player: &PlayerState, target: &Entity, heading: Heading) {
    if plan.lateral.is_some() || !target.kind().allows_lateral_moves() {
        return;
    }
    let dx = player.entity.x_diff(target) * heading.sign();
    if dx > 0 && player.can_move_right {
        plan.lateral = Some(Direction::Right);
    } else if dx < 0 && player.can_move_left {
        plan.lateral = Some(Direction::Left);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::identity_tracker::{IdentityTracker, TrackingConfig};
    use crate::analysis::trajectory_predictor::{TrajectoryConfig, TrajectoryPredictor};
    use crate::types::{EntityKind, LaneSegment, PressMode, Point};

    const STARTED: Duration = Duration::from_secs(10);

    fn player_at(x: i32, y: i32) -> PlayerState {
        PlayerState {
            entity: Entity::new(EntityKind::Player, Point::new(x, y), 20),
            can_move_left: true,
            can_move_right: true,
        }
    }

    fn entity(kind: EntityKind, x: i32, y: i32, width: i32) -> Entity {
        Entity::new(kind, Point::new(x, y), width)
    }

    fn tracked(entities: Vec<Entity>) -> IdentityTracker {
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        tracker.reconcile(entities);
        tracker
    }

    fn started_engine() -> DecisionEngine {
        DecisionEngine::new(DecisionConfig {
            auto_start: true,
            ..DecisionConfig::default()
        })
    }

    fn scene<'a>(
        player: &'a PlayerState,
        hostiles: &'a [TrackedHostile],
        fuels: &'a [Entity],
        lanes: &'a [LaneSegment],
    ) -> Scene<'a> {
        Scene {
            player,
            hostiles,
            fuels,
            lanes,
        }
    }

    fn tokens(commands: &[Command]) -> Vec<CommandToken> {
        commands.iter().map(|c| c.token).collect()
    }

    #[test]
    fn test_start_after_delay_only_once() {
        let mut engine = DecisionEngine::new(DecisionConfig::default());
        let player = PlayerState::missing(20);
        let s = scene(&player, &[], &[], &[]);

        assert!(engine.decide(&s, Duration::from_millis(2999)).is_empty());
        assert!(!engine.is_started());

        let commands = engine.decide(&s, Duration::from_millis(3000));
        assert_eq!(commands, vec![Command::hold(CommandToken::Start)]);
        assert!(engine.is_started());

        assert!(engine.decide(&s, Duration::from_millis(3100)).is_empty());
    }

    #[test]
    fn test_start_frame_continues_with_policy() {
        let mut engine = DecisionEngine::new(DecisionConfig::default());
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Boat, 202, 200, 50)]);
        let s = scene(&player, tracker.tracks(), &[], &[]);
        let commands = engine.decide(&s, Duration::from_secs(3));
        assert_eq!(
            tokens(&commands),
            vec![CommandToken::Start, CommandToken::Fire, CommandToken::Right]
        );
    }

    #[test]
    fn test_auto_start_never_presses_start() {
        let mut engine = started_engine();
        let player = PlayerState::missing(20);
        let s = scene(&player, &[], &[], &[]);
        assert!(engine.decide(&s, Duration::ZERO).is_empty());
        assert!(engine.decide(&s, STARTED).is_empty());
    }

    #[test]
    fn test_fire_and_move_toward_aimed_hostile() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Helicopter, 196, 150, 30)]);
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &[]), STARTED);
        assert_eq!(
            commands,
            vec![Command::pulse(CommandToken::Fire), Command::hold(CommandToken::Left)]
        );
        assert_eq!(commands[0].mode, PressMode::Pulse);
    }

    #[test]
    fn test_fuel_between_suppresses_fire() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Boat, 200, 100, 50)]);
        let fuels = [entity(EntityKind::Fuel, 205, 250, 20)];
        let commands = engine.decide(&scene(&player, tracker.tracks(), &fuels, &[]), STARTED);
        assert!(!tokens(&commands).contains(&CommandToken::Fire));
        // Still free to steer toward the fuel.
        assert_eq!(tokens(&commands), vec![CommandToken::Right]);
    }

    #[test]
    fn test_fuel_behind_hostile_does_not_suppress_fire() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Boat, 200, 200, 50)]);
        let fuels = [entity(EntityKind::Fuel, 200, 100, 20)];
        let commands = engine.decide(&scene(&player, tracker.tracks(), &fuels, &[]), STARTED);
        assert!(tokens(&commands).contains(&CommandToken::Fire));
    }

    #[test]
    fn test_single_move_and_fire_budget() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![
            entity(EntityKind::Helicopter, 180, 380, 30),
            entity(EntityKind::Boat, 230, 200, 50),
            entity(EntityKind::Helicopter, 203, 120, 30),
            entity(EntityKind::Boat, 198, 60, 50),
        ]);
        let lanes = [LaneSegment::new(0, 100, 270)];
        let fuels = [entity(EntityKind::Fuel, 240, 300, 20)];
        let commands = engine.decide(&scene(&player, tracker.tracks(), &fuels, &lanes), STARTED);

        let t = tokens(&commands);
        let fires = t.iter().filter(|&&c| c == CommandToken::Fire).count();
        let moves = t
            .iter()
            .filter(|&&c| matches!(c, CommandToken::Left | CommandToken::Right))
            .count();
        assert_eq!(fires, 1);
        assert_eq!(moves, 1);
        // The closest helicopter (y=380) claims the move slot: sidestep right.
        assert_eq!(t.last(), Some(&CommandToken::Right));
    }

    #[test]
    fn test_nearest_hostile_wins_move() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        // Far boat to the left (approach), close heli just right (avoid → left).
        let tracker = tracked(vec![
            entity(EntityKind::Boat, 180, 100, 50),
            entity(EntityKind::Helicopter, 215, 370, 30),
        ]);
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &[]), STARTED);
        assert_eq!(commands, vec![Command::hold(CommandToken::Left)]);
    }

    #[test]
    fn test_plane_dodge_without_lateral_move() {
        let predictor = TrajectoryPredictor::new(TrajectoryConfig::default());
        let mut tracker = IdentityTracker::new(TrackingConfig::default());
        for t in 0..5 {
            let plane = entity(EntityKind::Plane, 100 + 2 * t, 200 + 4 * t, 25);
            for hostile in tracker.reconcile(vec![plane]).iter_mut() {
                predictor.update(hostile);
            }
        }
        // Intercept lands at x = 220.
        let mut engine = started_engine();
        let player = player_at(240, 440);
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &[]), STARTED);
        assert_eq!(commands, vec![Command::hold(CommandToken::Up)]);

        let far_player = player_at(400, 440);
        let commands = engine.decide(&scene(&far_player, tracker.tracks(), &[], &[]), STARTED);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_plane_in_sights_fires_without_moving() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Plane, 198, 200, 25)]);
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &[]), STARTED);
        assert_eq!(commands, vec![Command::pulse(CommandToken::Fire)]);
    }

    #[test]
    fn test_lane_pass_runs_after_fire() {
        // Firing at a plane leaves the move slot free, so lane centring
        // still fills it.
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Plane, 198, 200, 25)]);
        let lanes = [LaneSegment::new(250, 400, 270)];
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &lanes), STARTED);
        assert_eq!(
            commands,
            vec![
                Command::pulse(CommandToken::Fire),
                Command::hold(CommandToken::Right)
            ]
        );

        // A boat fire takes the slot first; the lane to the left loses.
        let tracker = tracked(vec![entity(EntityKind::Boat, 204, 200, 50)]);
        let lanes = [LaneSegment::new(20, 150, 270)];
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &lanes), STARTED);
        assert_eq!(
            tokens(&commands),
            vec![CommandToken::Fire, CommandToken::Right]
        );
    }

    #[test]
    fn test_bridge_fired_on_overlap() {
        let mut engine = started_engine();
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Bridge, 300, 150, 120)]);
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &[]), STARTED);
        assert_eq!(
            tokens(&commands),
            vec![CommandToken::Fire, CommandToken::Right]
        );
    }

    #[test]
    fn test_wall_blocks_move() {
        let mut engine = started_engine();
        let mut player = player_at(200, 400);
        player.can_move_right = false;
        let tracker = tracked(vec![entity(EntityKind::Boat, 204, 200, 50)]);
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &[]), STARTED);
        assert_eq!(commands, vec![Command::pulse(CommandToken::Fire)]);
    }

    #[test]
    fn test_lane_centering() {
        let mut engine = started_engine();
        let player = player_at(200, 400);

        // Inside lane [150, 290] (centre 220) but 20 px off: nudge right.
        let lanes = [LaneSegment::new(150, 290, 270), LaneSegment::new(350, 450, 270)];
        let commands = engine.decide(&scene(&player, &[], &[], &lanes), STARTED);
        assert_eq!(commands, vec![Command::hold(CommandToken::Right)]);

        // A reachable fuel loosens the tolerance; the fuel then pulls left.
        let fuels = [entity(EntityKind::Fuel, 180, 300, 20)];
        let commands = engine.decide(&scene(&player, &[], &fuels, &lanes), STARTED);
        assert_eq!(commands, vec![Command::hold(CommandToken::Left)]);

        // Well centred, nothing else to do.
        let centred = [LaneSegment::new(130, 270, 270)];
        assert!(engine
            .decide(&scene(&player, &[], &[], &centred), STARTED)
            .is_empty());
    }

    #[test]
    fn test_move_into_lane_from_outside() {
        let mut engine = started_engine();
        let player = player_at(100, 400);
        let lanes = [LaneSegment::new(150, 300, 270)];
        let commands = engine.decide(&scene(&player, &[], &[], &lanes), STARTED);
        assert_eq!(commands, vec![Command::hold(CommandToken::Right)]);
    }

    #[test]
    fn test_missing_player_is_idle() {
        let mut engine = started_engine();
        let player = PlayerState::missing(20);
        let tracker = tracked(vec![entity(EntityKind::Boat, 0, 200, 50)]);
        let lanes = [LaneSegment::new(150, 300, 270)];
        let commands = engine.decide(&scene(&player, tracker.tracks(), &[], &lanes), STARTED);
        assert!(commands.is_empty());
    }

    #[test]
    fn test_manual_override_suppresses_policy() {
        let mut engine = DecisionEngine::new(DecisionConfig::default());
        engine.set_running(false);
        let player = player_at(200, 400);
        let tracker = tracked(vec![entity(EntityKind::Boat, 200, 200, 50)]);
        let s = scene(&player, tracker.tracks(), &[], &[]);

        assert_eq!(
            engine.decide(&s, Duration::from_secs(4)),
            vec![Command::hold(CommandToken::Start)]
        );
        assert!(engine.decide(&s, Duration::from_secs(5)).is_empty());

        engine.set_running(true);
        assert!(tokens(&engine.decide(&s, Duration::from_secs(6))).contains(&CommandToken::Fire));
    }
}
