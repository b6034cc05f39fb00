//! Connection lifecycle: `Connecting -> Authenticated -> Active`, then gone.
//!
//! The gateway owns a per-connection state table. `connect` does all of its
//! awaiting (credential verification, group lookup) up front and then runs
//! the registration tail while holding its own table entry. `disconnect`
//! removes that entry, so the two serialize: a disconnect either observes the
//! registered session and tears it down, or wins the race and the pending
//! connect finds its entry gone and registers nothing.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parley_types::config::GatewayConfig;
use parley_types::error::{GatewayError, IdentityError};
use parley_types::event::{ClientEvent, ConnectionSuccess, GroupsReloaded, OnlineUsers, ServerEvent};
use parley_types::group::GroupSummary;
use parley_types::identity::Identity;
use parley_types::ids::{ConnectionId, GroupId};
use parley_types::session::{ConnectionState, OnlineUser, PresenceStatus, Session};
use tracing::{debug, info, warn};

use crate::channel::ChannelMembership;
use crate::identity::IdentityService;
use crate::message::router::MessageRouter;
use crate::presence::PresenceNotifier;
use crate::repository::group::GroupDirectory;
use crate::repository::message::MessageRepository;
use crate::session::{RegisterOutcome, SessionRegistry};
use crate::timeout::within;
use crate::transport::Transport;

pub struct Gateway<I, G, M, T> {
    identity: Arc<I>,
    groups: Arc<G>,
    registry: Arc<SessionRegistry>,
    membership: Arc<ChannelMembership>,
    router: MessageRouter<M, T>,
    presence: PresenceNotifier<T>,
    transport: Arc<T>,
    connections: DashMap<ConnectionId, ConnectionState>,
    timeout: Duration,
}

impl<I, G, M, T> Gateway<I, G, M, T>
where
    I: IdentityService,
    G: GroupDirectory,
    M: MessageRepository,
    T: Transport,
{
    pub fn new(
        identity: Arc<I>,
        groups: Arc<G>,
        messages: Arc<M>,
        transport: Arc<T>,
        config: &GatewayConfig,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let membership = Arc::new(ChannelMembership::new());
        let router = MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&membership),
            messages,
            Arc::clone(&transport),
            config,
        );
        let presence = PresenceNotifier::new(Arc::clone(&registry), Arc::clone(&transport));
        Self {
            identity,
            groups,
            registry,
            membership,
            router,
            presence,
            transport,
            connections: DashMap::new(),
            timeout: config.collaborator_timeout(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn membership(&self) -> &ChannelMembership {
        &self.membership
    }

    /// Current lifecycle state. `None` once the connection has disconnected.
    pub fn state(&self, connection_id: &ConnectionId) -> Option<ConnectionState> {
        self.connections.get(connection_id).map(|s| *s)
    }

    /// Record a newly accepted transport connection.
    pub fn open(&self, connection_id: ConnectionId) {
        self.connections
            .insert(connection_id, ConnectionState::Connecting);
        debug!(%connection_id, "connection opened");
    }

    /// Authenticate `connection_id` and make it Active.
    ///
    /// On any failure the connection is force-closed and nothing is
    /// registered. If the connection went away while verification was in
    /// flight, the call fails without registering.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        credential: Option<&str>,
    ) -> Result<Session, GatewayError> {
        match self.state(&connection_id) {
            Some(ConnectionState::Connecting) => {}
            Some(other) => {
                return Err(GatewayError::Conflict(format!(
                    "connection {connection_id} is already {other}"
                )));
            }
            None => {
                return Err(GatewayError::unauthorized("connection is closed"));
            }
        }

        let (identity, groups) = match self.authenticate(credential).await {
            Ok(found) => found,
            Err(e) => {
                warn!(%connection_id, error = %e, "connection rejected");
                self.reject(&connection_id);
                return Err(e);
            }
        };

        let session = Session::new(&identity, connection_id);
        let group_ids: Vec<GroupId> = groups.iter().map(|g| g.id.clone()).collect();

        let outcome = {
            let Some(mut state) = self.connections.get_mut(&connection_id) else {
                debug!(%connection_id, user_id = %identity.user_id, "disconnected during authentication");
                return Err(GatewayError::unauthorized("connection closed during authentication"));
            };
            *state = ConnectionState::Authenticated;

            let outcome = match self.registry.register(session.clone()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    drop(state);
                    self.reject(&connection_id);
                    return Err(e);
                }
            };
            if let RegisterOutcome::Replaced { previous } = &outcome {
                self.membership.clear(&previous.connection_id);
                self.transport.close(&previous.connection_id);
            }
            self.membership
                .install(connection_id, &identity.user_id, &group_ids);
            *state = ConnectionState::Active;

            let welcome = ServerEvent::ConnectionSuccess(ConnectionSuccess {
                user_id: identity.user_id.clone(),
                username: identity.username.clone(),
            });
            if let Err(e) = self.transport.send(&connection_id, &welcome) {
                warn!(%connection_id, error = %e, "failed to send connection_success");
            }
            if !matches!(outcome, RegisterOutcome::Replaced { .. }) {
                self.presence
                    .announce(&identity.user_id, &identity.username, PresenceStatus::Online);
            }
            outcome
        };

        if let RegisterOutcome::Replaced { previous } = outcome {
            self.connections.remove(&previous.connection_id);
            info!(
                %connection_id,
                previous = %previous.connection_id,
                user_id = %identity.user_id,
                "session replaced by new connection"
            );
        } else {
            info!(%connection_id, user_id = %identity.user_id, groups = group_ids.len(), "session active");
        }
        Ok(session)
    }

    async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<(Identity, Vec<GroupSummary>), GatewayError> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(IdentityError::MissingCredential)?;
        let identity = within(
            self.timeout,
            "credential verification",
            self.identity.verify(credential),
        )
        .await??;
        let groups = within(
            self.timeout,
            "group lookup",
            self.groups.groups_for(&identity.user_id),
        )
        .await?
        .map_err(|e| GatewayError::PersistenceFailed(format!("group lookup failed: {e}")))?;
        Ok((identity, groups))
    }

    fn reject(&self, connection_id: &ConnectionId) {
        self.connections.remove(connection_id);
        self.transport.close(connection_id);
    }

    /// Tear down a connection. Runs at most once per connection; later calls
    /// return `false`.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, last_state)) = self.connections.remove(connection_id) else {
            return false;
        };
        let session = self.registry.unregister(connection_id);
        let cleared = self.membership.clear(connection_id);
        self.transport.close(connection_id);

        match session {
            Some(session) => {
                self.presence
                    .announce(&session.user_id, &session.username, PresenceStatus::Offline);
                info!(%connection_id, user_id = %session.user_id, channels = cleared, "session closed");
            }
            None => debug!(%connection_id, state = %last_state, "connection closed without session"),
        }
        true
    }

    /// Dispatch one inbound event. Errors are also reported to the client as
    /// an `error` event.
    pub async fn handle(
        &self,
        connection_id: &ConnectionId,
        event: ClientEvent,
    ) -> Result<(), GatewayError> {
        let name = event.name();
        let result = match event {
            ClientEvent::SendMessage(input) => {
                self.router.route(connection_id, input).await.map(|_| ())
            }
            ClientEvent::ReloadGroups => self.reload_groups(connection_id).await.map(|_| ()),
            ClientEvent::GetOnlineUsers => self.send_online_users(connection_id),
        };
        if let Err(e) = &result {
            debug!(%connection_id, event = name, error = %e, "event failed");
            self.report_error(connection_id, e);
        }
        result
    }

    /// Refresh the connection's group snapshot from the directory.
    pub async fn reload_groups(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Vec<GroupSummary>, GatewayError> {
        let session = self
            .registry
            .session(connection_id)
            .ok_or_else(|| GatewayError::unauthorized("connection is not authenticated"))?;
        let groups = within(
            self.timeout,
            "group lookup",
            self.groups.groups_for(&session.user_id),
        )
        .await?
        .map_err(|e| GatewayError::PersistenceFailed(format!("group lookup failed: {e}")))?;

        let _entry = self
            .connections
            .get(connection_id)
            .filter(|s| **s == ConnectionState::Active)
            .ok_or_else(|| GatewayError::unauthorized("connection is closed"))?;
        if self.registry.lookup_user(connection_id).is_none() {
            return Err(GatewayError::unauthorized("session was replaced"));
        }

        let ids: Vec<GroupId> = groups.iter().map(|g| g.id.clone()).collect();
        // an eviction may have cleared this connection after the check above
        let diff = self
            .membership
            .reload_groups(*connection_id, &ids)
            .ok_or_else(|| GatewayError::unauthorized("session was replaced"))?;
        let reply = ServerEvent::GroupsReloaded(GroupsReloaded {
            count: groups.len(),
            groups: groups.clone(),
        });
        self.transport.send(connection_id, &reply)?;
        info!(
            %connection_id,
            user_id = %session.user_id,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "groups reloaded"
        );
        Ok(groups)
    }

    pub fn online_users(&self) -> Vec<OnlineUser> {
        self.registry.online_users()
    }

    fn send_online_users(&self, connection_id: &ConnectionId) -> Result<(), GatewayError> {
        if self.registry.lookup_user(connection_id).is_none() {
            return Err(GatewayError::unauthorized("connection is not authenticated"));
        }
        let reply = ServerEvent::OnlineUsers(OnlineUsers {
            users: self.online_users(),
        });
        self.transport.send(connection_id, &reply)?;
        Ok(())
    }

    /// Surface an error to the client. Delivery failures are only logged.
    pub fn report_error(&self, connection_id: &ConnectionId, error: &GatewayError) {
        if let Err(e) = self
            .transport
            .send(connection_id, &ServerEvent::error(error.to_string()))
        {
            debug!(%connection_id, error = %e, "could not deliver error event");
        }
    }
}
