//! Group, presence and profile commands.
//!
//! Each command validates its arguments locally, then runs as one
//! request/response query over the open session.

use super::error::{SessionError, SessionResult};
use super::frame::{GroupMetadata, ParticipantAction, ParticipantChange, ParticipantResult, Query, QueryResult};
use super::session::SessionController;
use super::traits::TransportChannel;
use crate::auth::CredentialStore;
use crate::codec::MediaSource;
use crate::jid::Jid;
use tracing::info;

fn parse_group(raw: &str) -> SessionResult<Jid> {
    let jid: Jid = raw.parse()?;
    if !jid.is_group() {
        return Err(SessionError::InvalidIdentity(format!(
            "not a group identity: {}",
            raw
        )));
    }
    Ok(jid)
}

fn parse_user(raw: &str) -> SessionResult<Jid> {
    let jid: Jid = raw.parse()?;
    if !jid.is_user() {
        return Err(SessionError::InvalidIdentity(format!(
            "not a user identity: {}",
            raw
        )));
    }
    Ok(jid)
}

fn expect_ok(result: QueryResult, command: &'static str) -> SessionResult<()> {
    match result {
        QueryResult::Ok => Ok(()),
        _ => Err(SessionError::UnexpectedResponse(command)),
    }
}

impl<T: TransportChannel, S: CredentialStore> SessionController<T, S> {
    /// Create a group with at least one participant
    pub async fn create_group(
        &self,
        subject: &str,
        participants: &[&str],
    ) -> SessionResult<GroupMetadata> {
        if participants.is_empty() {
            return Err(SessionError::InvalidRequest(
                "no participants provided".to_string(),
            ));
        }
        let participants = participants
            .iter()
            .map(|p| parse_user(p))
            .collect::<SessionResult<Vec<_>>>()?;

        info!(subject, participants = participants.len(), "creating group");
        let query = Query::CreateGroup {
            subject: subject.to_string(),
            participants,
        };
        match self.query(query).await? {
            QueryResult::Group(metadata) => Ok(metadata),
            _ => Err(SessionError::UnexpectedResponse("create_group")),
        }
    }

    pub async fn update_group_subject(&self, jid: &str, subject: &str) -> SessionResult<()> {
        let jid = parse_group(jid)?;
        info!(group = %jid, subject, "updating group subject");
        let query = Query::UpdateGroupSubject {
            jid,
            subject: subject.to_string(),
        };
        expect_ok(self.query(query).await?, "update_group_subject")
    }

    pub async fn update_group_description(
        &self,
        jid: &str,
        description: &str,
    ) -> SessionResult<()> {
        let jid = parse_group(jid)?;
        info!(group = %jid, "updating group description");
        let query = Query::UpdateGroupDescription {
            jid,
            description: description.to_string(),
        };
        expect_ok(self.query(query).await?, "update_group_description")
    }

    /// Add, remove, promote or demote participants; one result per change
    pub async fn update_group_participants(
        &self,
        jid: &str,
        changes: &[(&str, ParticipantAction)],
    ) -> SessionResult<Vec<ParticipantResult>> {
        let jid = parse_group(jid)?;
        if changes.is_empty() {
            return Err(SessionError::InvalidRequest(
                "no participant changes provided".to_string(),
            ));
        }
        let changes = changes
            .iter()
            .map(|(participant, action)| {
                Ok(ParticipantChange {
                    jid: parse_user(participant)?,
                    action: *action,
                })
            })
            .collect::<SessionResult<Vec<_>>>()?;

        info!(group = %jid, changes = changes.len(), "updating group participants");
        match self
            .query(Query::UpdateGroupParticipants { jid, changes })
            .await?
        {
            QueryResult::Participants { participants } => Ok(participants),
            _ => Err(SessionError::UnexpectedResponse("update_group_participants")),
        }
    }

    pub async fn leave_group(&self, jid: &str) -> SessionResult<()> {
        let jid = parse_group(jid)?;
        info!(group = %jid, "leaving group");
        expect_ok(self.query(Query::LeaveGroup { jid }).await?, "leave_group")
    }

    /// About text of a user
    pub async fn get_status(&self, jid: &str) -> SessionResult<String> {
        let jid = parse_user(jid)?;
        match self.query(Query::GetStatus { jid }).await? {
            QueryResult::Status { status } => Ok(status),
            _ => Err(SessionError::UnexpectedResponse("get_status")),
        }
    }

    /// Set this account's about text
    pub async fn update_status(&self, status: &str) -> SessionResult<()> {
        info!("updating status");
        let query = Query::UpdateStatus {
            status: status.to_string(),
        };
        expect_ok(self.query(query).await?, "update_status")
    }

    pub async fn update_profile_picture(
        &self,
        jid: &str,
        image: impl Into<MediaSource>,
    ) -> SessionResult<()> {
        let jid: Jid = jid.parse()?;
        let image = image.into().into_bytes()?;
        info!(jid = %jid, bytes = image.len(), "updating profile picture");
        expect_ok(
            self.query(Query::UpdateProfilePicture { jid, image }).await?,
            "update_profile_picture",
        )
    }

    pub async fn update_profile_name(&self, name: &str) -> SessionResult<()> {
        if name.trim().is_empty() {
            return Err(SessionError::InvalidRequest(
                "profile name is empty".to_string(),
            ));
        }
        info!(name, "updating profile name");
        let query = Query::UpdateProfileName {
            name: name.to_string(),
        };
        expect_ok(self.query(query).await?, "update_profile_name")
    }
}
