//! Team workflow.

use crate::error::AppError;
use crate::models::{Team, TeamMember, TeamWithMembers};
use crate::repository::{Scope, Storage, UnitOfWork};

/// Creates teams together with their initial roster.
pub struct TeamService<T: Send + 'static> {
    storage: Storage<T>,
}

impl<T: Send + 'static> Clone for TeamService<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<T: Send + 'static> TeamService<T> {
    pub fn new(storage: Storage<T>) -> Self {
        Self { storage }
    }

    /// Create `team` and insert `members` as its users, atomically.
    ///
    /// A taken team name fails with `TeamExists` and writes nothing. Any
    /// member insert failure rolls the team back as well.
    pub async fn create_team_with_users(
        &self,
        team: &Team,
        members: &[TeamMember],
    ) -> Result<TeamWithMembers, AppError> {
        self.create_team_with_users_in(&mut Scope::new(), team, members)
            .await
    }

    pub async fn create_team_with_users_in(
        &self,
        scope: &mut Scope<T>,
        team: &Team,
        members: &[TeamMember],
    ) -> Result<TeamWithMembers, AppError> {
        let mut uow = UnitOfWork::enter(&*self.storage.transactor, scope).await?;
        self.storage
            .teams
            .create(uow.scope(), team, members)
            .await?;
        uow.commit().await?;

        log::info!(
            "[team] created {} with {} members",
            team.team_name,
            members.len()
        );

        Ok(TeamWithMembers {
            team_name: team.team_name.clone(),
            members: members.to_vec(),
        })
    }

    /// Look up a team and its current members.
    pub async fn get_team(&self, team_name: &str) -> Result<TeamWithMembers, AppError> {
        self.get_team_in(&mut Scope::new(), team_name).await
    }

    pub async fn get_team_in(
        &self,
        scope: &mut Scope<T>,
        team_name: &str,
    ) -> Result<TeamWithMembers, AppError> {
        let team = self.storage.teams.get_by_name(scope, team_name).await?;
        let members = self
            .storage
            .users
            .list_by_team(scope, &team.team_name)
            .await?;

        Ok(TeamWithMembers {
            team_name: team.team_name,
            members: members.into_iter().map(TeamMember::from).collect(),
        })
    }
}
